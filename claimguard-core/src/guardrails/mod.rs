//! Guardrails applied to a model decision.
//!
//! - **Content checks** ([`run_content_checks`]): PII, bias, safety and
//!   compliance. Any failure escalates the decision.
//! - **Deterministic overrides** ([`apply_deterministic_guardrails`]):
//!   coverage exclusions, exclusion-impact clauses and non-coverage force an
//!   `approved` decision to `rejected`.
//!
//! Neither path can move a decision toward `approved`.

mod content;
mod deterministic;

pub use content::{
    check_bias, check_compliance, check_pii, check_safety, escalate_on_failure, redact_pii,
    run_content_checks, GuardrailCheck, GuardrailResult, GuardrailViolation, Severity,
    ESCALATION_CONFIDENCE_CAP, MIN_REJECTION_CONFIDENCE,
};
pub use deterministic::{apply_deterministic_guardrails, Override, OverrideRule};
