//! Aggregation of verifier findings into a [`HallucinationReport`].

use std::collections::BTreeSet;

use super::sections::PolicyDocument;
use super::types::{FailedExcerpt, FailedSection, FindingIndex, HallucinationReport};

/// Append-only accumulator used by the verifier.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    failed_sections: Vec<FailedSection>,
    failed_excerpts: Vec<FailedExcerpt>,
    valid_section_refs: BTreeSet<String>,
    valid_excerpt_refs: BTreeSet<String>,
    total_clauses_checked: usize,
    total_citations_checked: usize,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clauses_checked(&mut self, count: usize) -> &mut Self {
        self.total_clauses_checked += count;
        self
    }

    pub fn citations_checked(&mut self, count: usize) -> &mut Self {
        self.total_citations_checked += count;
        self
    }

    pub fn section_valid(&mut self, section_number: &str) {
        self.valid_section_refs.insert(section_number.to_string());
    }

    pub fn excerpt_valid(&mut self, section_number: &str) {
        self.valid_excerpt_refs.insert(section_number.to_string());
    }

    pub fn section_failed(
        &mut self,
        index: FindingIndex,
        section_number: &str,
        reason: impl Into<String>,
    ) {
        self.failed_sections.push(FailedSection {
            index,
            section_number: section_number.to_string(),
            reason: reason.into(),
        });
    }

    pub fn excerpt_failed(
        &mut self,
        index: FindingIndex,
        section_number: &str,
        excerpt_preview: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.failed_excerpts.push(FailedExcerpt {
            index,
            section_number: section_number.to_string(),
            excerpt_preview: excerpt_preview.into(),
            reason: reason.into(),
        });
    }

    /// Seal the report. The available-section catalogue is always the full
    /// document set, independent of what was cited.
    pub fn finish(self, document: &PolicyDocument) -> HallucinationReport {
        let hallucination_detected =
            !self.failed_sections.is_empty() || !self.failed_excerpts.is_empty();

        HallucinationReport {
            hallucination_detected,
            failed_sections: self.failed_sections,
            failed_excerpts: self.failed_excerpts,
            valid_section_refs: self.valid_section_refs,
            valid_excerpt_refs: self.valid_excerpt_refs,
            total_clauses_checked: self.total_clauses_checked,
            total_citations_checked: self.total_citations_checked,
            policy_sections_available: document.sorted_sections(),
            retry_failed: false,
        }
    }
}
