//! Coverage-check result contract.
//!
//! The coverage checker is an external rule tool; this crate consumes its
//! result to drive deterministic overrides and clause attribution.

use serde::{Deserialize, Serialize};

/// Outcome of the rule-based coverage check for one claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageResult {
    /// Stable clause identifier, e.g. "POL-2.3-WATER"
    pub clause_id: String,
    pub section_title: String,
    /// The claim type matched a known coverage rule
    pub matched: bool,
    /// The claim type is covered at all
    pub covered: bool,
    /// A policy exclusion applies to this claim
    pub exclusion_triggered: bool,
    pub triggered_exclusion_codes: Vec<String>,
    /// Exclusions attached to the matched rule
    pub exclusions: Vec<String>,
    pub notes: String,
    pub applicable_limit: Option<String>,
    pub coverage_limit: Option<f64>,
    pub deductible: Option<String>,
}

impl CoverageResult {
    /// A covered, exclusion-free result for the given clause.
    pub fn covered(clause_id: impl Into<String>, section_title: impl Into<String>) -> Self {
        Self {
            clause_id: clause_id.into(),
            section_title: section_title.into(),
            matched: true,
            covered: true,
            ..Self::default()
        }
    }

    /// A result for a claim type the policy does not cover.
    pub fn not_covered(clause_id: impl Into<String>, section_title: impl Into<String>) -> Self {
        Self {
            clause_id: clause_id.into(),
            section_title: section_title.into(),
            matched: true,
            covered: false,
            ..Self::default()
        }
    }

    pub fn with_triggered_exclusions<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggered_exclusion_codes = codes.into_iter().map(Into::into).collect();
        self.exclusion_triggered = !self.triggered_exclusion_codes.is_empty();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// `"covered"` or `"not_covered"`.
    pub fn status(&self) -> &'static str {
        if self.covered {
            "covered"
        } else {
            "not_covered"
        }
    }

    pub fn attribution(&self) -> ClauseAttribution {
        ClauseAttribution::from(self)
    }
}

/// Which policy clause a decision is attributed to.
///
/// Derived from the coverage check, never from model output, so it holds
/// even when the model's own citations fail verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseAttribution {
    pub clause_id: String,
    pub section_title: String,
    pub matched: bool,
    pub covered: bool,
    pub exclusion_triggered: bool,
    pub triggered_exclusion_codes: Vec<String>,
}

impl From<&CoverageResult> for ClauseAttribution {
    fn from(coverage: &CoverageResult) -> Self {
        Self {
            clause_id: coverage.clause_id.clone(),
            section_title: coverage.section_title.clone(),
            matched: coverage.matched,
            covered: coverage.covered,
            exclusion_triggered: coverage.exclusion_triggered,
            triggered_exclusion_codes: coverage.triggered_exclusion_codes.clone(),
        }
    }
}
