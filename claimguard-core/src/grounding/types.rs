//! Core types for clause-grounding verification.
//!
//! Model output arrives as loosely-typed JSON in two historical shapes. It is
//! normalized once into [`ModelOutput`] so the verifier never branches on key
//! presence.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::decision::DecisionType;

/// Which array of the model output a clause came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseShape {
    /// `generated_policy_clauses[]` with `clause_text` / `impact_on_claim` / `clause_type`
    Policy,
    /// `generated_clauses[]` with `clause_excerpt` / `impact`
    Legacy,
}

impl ClauseShape {
    /// JSON key of the array this shape is read from.
    pub fn key(self) -> &'static str {
        match self {
            Self::Policy => "generated_policy_clauses",
            Self::Legacy => "generated_clauses",
        }
    }
}

/// Allowed values of `clause_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseType {
    Coverage,
    Exclusion,
    Condition,
}

impl ClauseType {
    /// Allowed set, as rendered in finding reasons.
    pub const ALLOWED: &'static str = "coverage|exclusion|condition";

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "coverage" => Some(Self::Coverage),
            "exclusion" => Some(Self::Exclusion),
            "condition" => Some(Self::Condition),
            _ => None,
        }
    }
}

/// Allowed values of `impact_on_claim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimImpact {
    Supports,
    Exclusion,
    Conditional,
}

impl ClaimImpact {
    /// Allowed set, as rendered in finding reasons.
    pub const ALLOWED: &'static str = "supports|exclusion|conditional";

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "supports" => Some(Self::Supports),
            "exclusion" => Some(Self::Exclusion),
            "conditional" => Some(Self::Conditional),
            _ => None,
        }
    }
}

/// One structured clause from model output, in canonical form.
///
/// Enum-valued fields keep the raw string so invalid values can be reported
/// verbatim; use [`GeneratedClause::clause_type`] and
/// [`GeneratedClause::impact`] for the typed view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedClause {
    /// Source array
    pub shape: ClauseShape,
    /// Position inside the source array
    pub index: usize,
    /// Cited section identifier, e.g. "2.3"
    pub section_number: String,
    /// False when the model sent a non-string section number
    pub section_is_text: bool,
    /// Optional heading the model attached
    pub section_title: Option<String>,
    /// Raw `clause_type` (policy shape only; empty when absent)
    pub clause_type_raw: String,
    /// Verbatim excerpt claimed to exist in the policy
    pub clause_text: String,
    /// Raw impact under this shape's own key: `impact_on_claim` for the
    /// policy shape, `impact` for the legacy one (empty when absent)
    pub impact_raw: String,
    /// Raw impact under the other shape's key
    pub impact_alias_raw: String,
}

impl GeneratedClause {
    /// Typed clause type, `None` when absent or invalid.
    pub fn clause_type(&self) -> Option<ClauseType> {
        ClauseType::parse(&self.clause_type_raw)
    }

    /// Typed impact, `None` when absent or invalid.
    pub fn impact(&self) -> Option<ClaimImpact> {
        ClaimImpact::parse(&self.impact_raw)
    }

    /// Whether the model marked this clause as excluding the claim, under
    /// either impact key.
    pub fn is_exclusion_impact(&self) -> bool {
        let impact = if self.impact_raw.is_empty() {
            &self.impact_alias_raw
        } else {
            &self.impact_raw
        };
        impact == "exclusion"
    }
}

/// A `{section_number, quoted_text}` pair from `policy_text_citations[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCitation {
    pub index: usize,
    pub section_number: String,
    pub section_is_text: bool,
    pub quoted_text: String,
}

/// Parsed model output: the untouched JSON object plus its normalized clauses
/// and citations.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    raw: Value,
    clauses: Vec<GeneratedClause>,
    citations: Vec<PolicyCitation>,
}

impl ModelOutput {
    /// Normalize a decoded JSON value. Missing arrays default to empty.
    pub fn from_value(raw: Value) -> Self {
        let mut clauses = super::extract::normalize_clauses(&raw, ClauseShape::Policy);
        clauses.extend(super::extract::normalize_clauses(&raw, ClauseShape::Legacy));
        let citations = super::extract::normalize_citations(&raw);
        Self {
            raw,
            clauses,
            citations,
        }
    }

    /// An output with no content at all.
    pub fn empty() -> Self {
        Self::from_value(Value::Object(serde_json::Map::new()))
    }

    /// The JSON object exactly as the model produced it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// All clauses, policy shape first then legacy shape.
    pub fn clauses(&self) -> &[GeneratedClause] {
        &self.clauses
    }

    pub fn clauses_of(&self, shape: ClauseShape) -> impl Iterator<Item = &GeneratedClause> {
        self.clauses.iter().filter(move |c| c.shape == shape)
    }

    pub fn citations(&self) -> &[PolicyCitation] {
        &self.citations
    }

    /// Echo of a raw array field, or an empty array.
    pub fn raw_array(&self, key: &str) -> Value {
        self.raw
            .get(key)
            .filter(|v| v.is_array())
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()))
    }

    /// Decision proposed by the model. Unknown or missing values escalate.
    pub fn decision(&self) -> DecisionType {
        self.raw
            .get("decision")
            .and_then(Value::as_str)
            .and_then(DecisionType::parse)
            .unwrap_or(DecisionType::Escalated)
    }

    pub fn confidence(&self) -> f64 {
        self.raw
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
    }

    pub fn reasoning(&self) -> &str {
        self.str_field("reasoning")
    }

    pub fn compliance_notes(&self) -> &str {
        self.str_field("compliance_notes")
    }

    pub fn payout_amount(&self) -> Option<f64> {
        self.raw.get("payout_amount").and_then(Value::as_f64)
    }

    pub fn conditions(&self) -> Vec<String> {
        self.string_list("conditions")
    }

    pub fn risk_flags(&self) -> Vec<String> {
        self.string_list("risk_flags")
    }

    /// Section numbers cited anywhere, in first-seen order, without duplicates.
    pub fn cited_sections(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.clauses
            .iter()
            .map(|c| &c.section_number)
            .chain(self.citations.iter().map(|c| &c.section_number))
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    fn str_field(&self, key: &str) -> &str {
        self.raw.get(key).and_then(Value::as_str).unwrap_or("")
    }

    fn string_list(&self, key: &str) -> Vec<String> {
        self.raw
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Position of a finding: a clause index, or a citation index rendered as
/// `"citation_<i>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingIndex {
    Clause(usize),
    Citation(usize),
}

impl std::fmt::Display for FindingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clause(i) => write!(f, "{}", i),
            Self::Citation(i) => write!(f, "citation_{}", i),
        }
    }
}

impl Serialize for FindingIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Clause(i) => serializer.serialize_u64(*i as u64),
            Self::Citation(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for FindingIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .map(|i| Self::Clause(i as usize))
                .ok_or_else(|| de::Error::custom("finding index must be a non-negative integer")),
            Value::String(s) => s
                .strip_prefix("citation_")
                .and_then(|i| i.parse().ok())
                .map(Self::Citation)
                .ok_or_else(|| de::Error::custom(format!("invalid finding index '{}'", s))),
            other => Err(de::Error::custom(format!(
                "invalid finding index {}",
                other
            ))),
        }
    }
}

/// A cited section that the document does not define, or an invalid enum
/// value on a policy-shape clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSection {
    pub index: FindingIndex,
    pub section_number: String,
    pub reason: String,
}

/// A cited excerpt that does not occur verbatim in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedExcerpt {
    pub index: FindingIndex,
    pub section_number: String,
    pub excerpt_preview: String,
    pub reason: String,
}

/// Verification output for one model output against one document.
///
/// `hallucination_detected` is derived from the failure lists when the
/// report is built and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallucinationReport {
    pub(crate) hallucination_detected: bool,
    pub failed_sections: Vec<FailedSection>,
    pub failed_excerpts: Vec<FailedExcerpt>,
    pub valid_section_refs: BTreeSet<String>,
    pub valid_excerpt_refs: BTreeSet<String>,
    pub total_clauses_checked: usize,
    pub total_citations_checked: usize,
    /// Every section the document defines, sorted; never filtered.
    pub policy_sections_available: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) retry_failed: bool,
}

impl HallucinationReport {
    pub fn hallucination_detected(&self) -> bool {
        self.hallucination_detected
    }

    /// Set only when a retry was made and its output still failed.
    pub fn retry_failed(&self) -> bool {
        self.retry_failed
    }

    pub fn validation_passed(&self) -> bool {
        !self.hallucination_detected
    }

    pub(crate) fn mark_retry_failed(&mut self) {
        self.retry_failed = self.hallucination_detected;
    }

    /// Distinct section numbers behind `failed_sections`, in report order.
    pub fn invalid_section_numbers(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.failed_sections
            .iter()
            .map(|f| &f.section_number)
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    pub fn finding_count(&self) -> usize {
        self.failed_sections.len() + self.failed_excerpts.len()
    }
}

/// Result of the single permitted retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Parsed retry output, or the first-pass output if the retry could not be parsed
    pub output: ModelOutput,
    /// Report for `output`
    pub report: HallucinationReport,
    /// The retry still hallucinated; terminal
    pub retry_failed: bool,
    /// The retry response was unusable and the first-pass output was kept
    pub used_first_pass_output: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finding_index_serialization() {
        assert_eq!(serde_json::to_value(FindingIndex::Clause(3)).unwrap(), json!(3));
        assert_eq!(
            serde_json::to_value(FindingIndex::Citation(0)).unwrap(),
            json!("citation_0")
        );

        let parsed: FindingIndex = serde_json::from_value(json!("citation_7")).unwrap();
        assert_eq!(parsed, FindingIndex::Citation(7));
        let parsed: FindingIndex = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(parsed, FindingIndex::Clause(2));
        assert!(serde_json::from_value::<FindingIndex>(json!("clause_1")).is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(ClauseType::parse("exclusion"), Some(ClauseType::Exclusion));
        assert_eq!(ClauseType::parse("Exclusion"), None);
        assert_eq!(ClaimImpact::parse("conditional"), Some(ClaimImpact::Conditional));
        assert_eq!(ClaimImpact::parse("maybe"), None);
    }

    #[test]
    fn test_model_output_accessors() {
        let output = ModelOutput::from_value(json!({
            "decision": "approved",
            "confidence": 0.91,
            "reasoning": "Covered peril.",
            "conditions": ["Receipts required", 7],
            "generated_clauses": [{"section_number": "2.3", "clause_excerpt": "x"}],
            "generated_policy_clauses": [{"section_number": "1.1", "clause_text": "y"}],
            "policy_text_citations": [{"section_number": "2.3", "quoted_text": "z"}]
        }));

        assert_eq!(output.decision(), DecisionType::Approved);
        assert!((output.confidence() - 0.91).abs() < f64::EPSILON);
        assert_eq!(output.reasoning(), "Covered peril.");
        assert_eq!(output.conditions(), vec!["Receipts required".to_string()]);
        assert_eq!(output.clauses().len(), 2);
        assert_eq!(output.clauses()[0].shape, ClauseShape::Policy);
        assert_eq!(output.cited_sections(), vec!["1.1", "2.3"]);
        assert!(output.raw_array("risk_flags").as_array().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_decision_escalates() {
        let output = ModelOutput::from_value(json!({"decision": "maybe"}));
        assert_eq!(output.decision(), DecisionType::Escalated);
        assert_eq!(ModelOutput::empty().decision(), DecisionType::Escalated);
    }
}
