//! Clause grounding: verify that model citations exist in the policy text.
//!
//! The model claims to quote a policy. This module checks that claim
//! syntactically: every cited section number must be a header the document
//! defines, and every quoted span must occur verbatim in the document text.
//!
//! ## Flow
//!
//! ```text
//! policy text ──► extract_sections ──► PolicyDocument
//!                                          │
//! model text ──► parse_or_escalate ──► ModelOutput ──► CitationVerifier ──► HallucinationReport
//!                                                           ▲                    │ failed?
//!                                                           └── RetryController ◄┘ (once)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimguard_core::grounding::{verify_model_output, ModelOutput, PolicyDocument};
//!
//! let doc = PolicyDocument::new("\n2.3 WATER DAMAGE\nBurst pipes are covered.\n");
//! let output = ModelOutput::from_value(serde_json::json!({
//!     "generated_clauses": [{"section_number": "2.3", "clause_excerpt": "Burst pipes"}]
//! }));
//! let (_, report) = verify_model_output(output, &doc);
//! assert!(report.validation_passed());
//! ```

mod extract;
mod report;
mod retry;
mod sections;
mod types;
mod verifier;

#[cfg(test)]
mod proptest;

pub use extract::{escalation_default, extract_json_block, parse_model_json, parse_or_escalate};
pub use report::ReportBuilder;
pub use retry::{GroundingOutcome, RetryController, RetryState, MAX_VERIFICATION_ATTEMPTS};
pub use sections::{extract_sections, PolicyCache, PolicyDocument};
pub use types::{
    ClaimImpact, ClauseShape, ClauseType, FailedExcerpt, FailedSection, FindingIndex,
    GeneratedClause, HallucinationReport, ModelOutput, PolicyCitation, RetryOutcome,
};
pub use verifier::CitationVerifier;

pub(crate) use verifier::char_prefix;

use serde_json::Value;

/// Verify a parsed model output with default settings.
pub fn verify_model_output(
    output: ModelOutput,
    document: &PolicyDocument,
) -> (ModelOutput, HallucinationReport) {
    CitationVerifier::default().verify(output, document)
}

/// Verify a decoded JSON model output against raw policy text.
///
/// The JSON is returned unchanged alongside the report.
pub fn verify_llm_clauses(model_output: Value, policy_text: &str) -> (Value, HallucinationReport) {
    let document = PolicyDocument::new(policy_text);
    let (output, report) = verify_model_output(ModelOutput::from_value(model_output), &document);
    (output.into_raw(), report)
}
