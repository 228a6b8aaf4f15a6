//! Decision types and the emitted decision payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::coverage::ClauseAttribution;
use crate::grounding::HallucinationReport;
use crate::guardrails::GuardrailResult;

/// Final disposition of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Approved,
    Rejected,
    Escalated,
}

impl DecisionType {
    /// Parse a model-supplied value. Matching is case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
        }
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable decision state threaded through the post-model steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_type: DecisionType,
    pub confidence: f64,
    pub reasoning: String,
    /// Audit trail of deterministic overrides, in firing order
    pub override_reasons: Vec<String>,
}

impl DecisionRecord {
    pub fn new(decision_type: DecisionType, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            decision_type,
            confidence,
            reasoning: reasoning.into(),
            override_reasons: Vec::new(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision_type == DecisionType::Approved
    }

    /// Force the decision and record why.
    pub fn override_with(&mut self, decision_type: DecisionType, reason: impl Into<String>) {
        self.decision_type = decision_type;
        self.override_reasons.push(reason.into());
    }

    /// Escalate with `prefix` prepended to the reasoning. Rejections are kept.
    pub fn escalate_unless_rejected(&mut self, prefix: &str) -> bool {
        if self.decision_type == DecisionType::Rejected {
            return false;
        }
        self.decision_type = DecisionType::Escalated;
        self.reasoning = format!("{}{}", prefix, self.reasoning);
        true
    }

    pub fn escalated_to_human(&self) -> bool {
        self.decision_type == DecisionType::Escalated
    }
}

/// Render cited section numbers as `POLICY_SECTION_<n>` identifiers.
pub fn format_generated_sections(sections: &[String]) -> Vec<String> {
    sections
        .iter()
        .map(|s| format!("POLICY_SECTION_{}", s))
        .collect()
}

/// The record emitted for every processed claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPayload {
    pub trace_id: Uuid,
    pub claim_id: String,
    pub decision_type: DecisionType,
    pub confidence: f64,
    pub reasoning: String,
    pub payout_amount: Option<f64>,
    pub conditions: Vec<String>,
    pub risk_flags: Vec<String>,
    pub compliance_notes: String,
    pub coverage_status: String,
    pub clause_attribution: ClauseAttribution,
    /// Echoed from the final model output
    pub generated_clauses: Value,
    pub generated_policy_clauses: Value,
    pub policy_text_citations: Value,
    pub deterministic_overrides: Vec<String>,
    pub policy_text_hash: String,
    pub retrieved_context_hash: String,
    pub llm_generated_sections: Vec<String>,
    pub validation_passed: bool,
    pub retry_attempted: bool,
    pub escalated_to_human: bool,
    pub clause_verification: HallucinationReport,
    pub guardrails: Vec<GuardrailResult>,
    pub processed_at: DateTime<Utc>,
}
