//! Deterministic override chain.
//!
//! Authoritative signals from the coverage check and from the model's own
//! exclusion-typed clauses override an `approved` decision. Rules run in a
//! fixed order and each is guarded on the decision still being `approved`,
//! so the chain only ever moves a decision from approved to rejected and
//! fires at most once.

use serde::{Deserialize, Serialize};

use crate::coverage::CoverageResult;
use crate::decision::{DecisionRecord, DecisionType};
use crate::grounding::ModelOutput;

/// Rules of the override chain, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideRule {
    /// The coverage check reported a triggered exclusion
    ExclusionTriggered,
    /// A generated clause carries an exclusion impact
    ExclusionClause,
    /// The claim type is not covered at all
    NotCovered,
}

impl OverrideRule {
    pub const CHAIN: [OverrideRule; 3] = [
        OverrideRule::ExclusionTriggered,
        OverrideRule::ExclusionClause,
        OverrideRule::NotCovered,
    ];

    /// Reason text when this rule applies, `None` when it does not.
    fn evaluate(self, coverage: &CoverageResult, output: &ModelOutput) -> Option<String> {
        match self {
            Self::ExclusionTriggered => coverage.exclusion_triggered.then(|| {
                let codes = if coverage.triggered_exclusion_codes.is_empty() {
                    "unspecified".to_string()
                } else {
                    coverage.triggered_exclusion_codes.join(", ")
                };
                format!(
                    "Policy exclusion triggered ({}): approved decision overridden to rejected",
                    codes
                )
            }),
            Self::ExclusionClause => output
                .clauses()
                .iter()
                .find(|c| c.is_exclusion_impact())
                .map(|clause| {
                    format!(
                        "Generated clause for section {} has exclusion impact: \
                         approved decision overridden to rejected",
                        clause.section_number
                    )
                }),
            Self::NotCovered => (!coverage.covered).then(|| {
                "Claim type is not covered under this policy: approved decision overridden to rejected"
                    .to_string()
            }),
        }
    }
}

/// One fired override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub rule: OverrideRule,
    pub reason: String,
}

/// Apply the override chain to `record`.
///
/// Fired reasons are appended to `record.override_reasons` and returned.
/// Rejected and escalated decisions are never touched.
pub fn apply_deterministic_guardrails(
    record: &mut DecisionRecord,
    coverage: &CoverageResult,
    output: &ModelOutput,
) -> Vec<Override> {
    let mut fired = Vec::new();

    for rule in OverrideRule::CHAIN {
        if !record.is_approved() {
            break;
        }
        if let Some(reason) = rule.evaluate(coverage, output) {
            tracing::info!(rule = ?rule, %reason, "Deterministic override");
            record.override_with(DecisionType::Rejected, reason.clone());
            fired.push(Override { rule, reason });
        }
    }

    fired
}
