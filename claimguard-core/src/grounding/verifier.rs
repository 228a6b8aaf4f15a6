//! Citation verifier: checks every cited section and excerpt against the
//! policy document.
//!
//! Matching is purely syntactic. A section is grounded when the document
//! defines it; an excerpt is grounded when it occurs byte-for-byte in the
//! document text. There is no fuzzy matching.

use crate::config::VerifierConfig;

use super::report::ReportBuilder;
use super::sections::PolicyDocument;
use super::types::{
    ClaimImpact, ClauseShape, ClauseType, FindingIndex, GeneratedClause, HallucinationReport,
    ModelOutput, PolicyCitation,
};

/// Stateless verifier. Repeated calls on the same inputs produce identical
/// reports.
#[derive(Debug, Clone, Default)]
pub struct CitationVerifier {
    config: VerifierConfig,
}

impl CitationVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify a model output. The output is returned unchanged alongside its
    /// report.
    pub fn verify(
        &self,
        output: ModelOutput,
        document: &PolicyDocument,
    ) -> (ModelOutput, HallucinationReport) {
        let report = self.report(&output, document);
        (output, report)
    }

    /// Build the report without taking ownership of the output.
    pub fn report(&self, output: &ModelOutput, document: &PolicyDocument) -> HallucinationReport {
        let mut builder = ReportBuilder::new();
        builder.clauses_checked(output.clauses().len());
        builder.citations_checked(output.citations().len());

        for clause in output.clauses_of(ClauseShape::Policy) {
            check_clause_section(&mut builder, clause, document);
            self.check_policy_clause_text(&mut builder, clause, document);
        }

        for clause in output.clauses_of(ClauseShape::Legacy) {
            check_clause_section(&mut builder, clause, document);
            self.check_full_excerpt(
                &mut builder,
                FindingIndex::Clause(clause.index),
                &clause.section_number,
                &clause.clause_text,
                "Clause excerpt not found as substring in policy document",
                document,
            );
        }

        for citation in output.citations() {
            self.check_citation(&mut builder, citation, document);
        }

        for clause in output.clauses_of(ClauseShape::Policy) {
            check_enum_fields(&mut builder, clause);
        }

        let report = builder.finish(document);
        if report.hallucination_detected() {
            tracing::debug!(
                failed_sections = report.failed_sections.len(),
                failed_excerpts = report.failed_excerpts.len(),
                "Ungrounded citations found"
            );
        }
        report
    }

    fn check_citation(
        &self,
        builder: &mut ReportBuilder,
        citation: &PolicyCitation,
        document: &PolicyDocument,
    ) {
        let index = FindingIndex::Citation(citation.index);
        check_section(
            builder,
            index,
            &citation.section_number,
            citation.section_is_text,
            document,
            "Citation section",
        );
        self.check_full_excerpt(
            builder,
            index,
            &citation.section_number,
            &citation.quoted_text,
            "Quoted text not found as substring in policy document",
            document,
        );
    }

    /// Policy-shape text is only checked when longer than the configured
    /// minimum, and only its trimmed leading prefix is matched.
    fn check_policy_clause_text(
        &self,
        builder: &mut ReportBuilder,
        clause: &GeneratedClause,
        document: &PolicyDocument,
    ) {
        let text = &clause.clause_text;
        if text.chars().count() <= self.config.min_clause_text_len {
            return;
        }

        let window = char_prefix(text, self.config.excerpt_prefix_chars).trim();
        if document.contains_verbatim(window) {
            builder.excerpt_valid(&clause.section_number);
        } else {
            builder.excerpt_failed(
                FindingIndex::Clause(clause.index),
                &clause.section_number,
                char_prefix(text, self.config.preview_chars),
                "Clause text not found as substring in policy document",
            );
        }
    }

    fn check_full_excerpt(
        &self,
        builder: &mut ReportBuilder,
        index: FindingIndex,
        section_number: &str,
        excerpt: &str,
        reason: &str,
        document: &PolicyDocument,
    ) {
        if excerpt.is_empty() {
            return;
        }
        if document.contains_verbatim(excerpt) {
            builder.excerpt_valid(section_number);
        } else {
            builder.excerpt_failed(
                index,
                section_number,
                char_prefix(excerpt, self.config.preview_chars),
                reason,
            );
        }
    }
}

fn check_clause_section(
    builder: &mut ReportBuilder,
    clause: &GeneratedClause,
    document: &PolicyDocument,
) {
    check_section(
        builder,
        FindingIndex::Clause(clause.index),
        &clause.section_number,
        clause.section_is_text,
        document,
        "Section",
    );
}

/// Only string section numbers can match. Anything else fails with its JSON
/// text in the reason.
fn check_section(
    builder: &mut ReportBuilder,
    index: FindingIndex,
    section_number: &str,
    is_text: bool,
    document: &PolicyDocument,
    label: &str,
) {
    if is_text && document.has_section(section_number) {
        builder.section_valid(section_number);
    } else {
        builder.section_failed(
            index,
            section_number,
            format!("{} '{}' not found in policy document", label, section_number),
        );
    }
}

fn check_enum_fields(builder: &mut ReportBuilder, clause: &GeneratedClause) {
    let index = FindingIndex::Clause(clause.index);

    let clause_type = &clause.clause_type_raw;
    if !clause_type.is_empty() && clause.clause_type().is_none() {
        builder.section_failed(
            index,
            &clause.section_number,
            format!(
                "Invalid clause_type '{}' — must be {}",
                clause_type,
                ClauseType::ALLOWED
            ),
        );
    }

    let impact = &clause.impact_raw;
    if !impact.is_empty() && clause.impact().is_none() {
        builder.section_failed(
            index,
            &clause.section_number,
            format!(
                "Invalid impact_on_claim '{}' — must be {}",
                impact,
                ClaimImpact::ALLOWED
            ),
        );
    }
}

/// First `n` characters of `s`, on a char boundary.
pub(crate) fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SAMPLE_POLICY;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const WATER_DOC: &str = "\n2.3 WATER DAMAGE\nBurst pipes and plumbing failures are covered.\n";

    fn verify(raw: serde_json::Value, text: &str) -> HallucinationReport {
        let doc = PolicyDocument::new(text);
        CitationVerifier::default().report(&ModelOutput::from_value(raw), &doc)
    }

    #[test]
    fn test_grounded_legacy_clause_passes() {
        let report = verify(
            json!({"generated_clauses": [
                {"section_number": "2.3", "clause_excerpt": "Burst pipes and plumbing failures"}
            ]}),
            WATER_DOC,
        );
        assert!(!report.hallucination_detected());
        assert!(report.valid_section_refs.contains("2.3"));
        assert!(report.valid_excerpt_refs.contains("2.3"));
        assert_eq!(report.total_clauses_checked, 1);
    }

    #[test]
    fn test_fabricated_section_flagged() {
        let report = verify(
            json!({"generated_clauses": [
                {"section_number": "99.9", "clause_excerpt": "Covers alien invasions"}
            ]}),
            WATER_DOC,
        );
        assert!(report.hallucination_detected());
        assert_eq!(report.failed_sections.len(), 1);
        assert_eq!(report.failed_sections[0].section_number, "99.9");
        assert!(report.failed_sections[0].reason.contains("99.9"));
    }

    #[test]
    fn test_fabricated_excerpt_with_valid_section() {
        let report = verify(
            json!({"generated_clauses": [
                {"section_number": "2.3",
                 "clause_excerpt": "This policy covers underwater basket weaving"}
            ]}),
            WATER_DOC,
        );
        assert!(report.hallucination_detected());
        assert!(report.failed_sections.is_empty());
        assert_eq!(report.failed_excerpts.len(), 1);
        assert_eq!(
            report.failed_excerpts[0].reason,
            "Clause excerpt not found as substring in policy document"
        );
    }

    const WATER_LINE: &str =
        "Burst pipes and plumbing failures are covered. Flood damage is excluded under Section 3.1.";

    #[test]
    fn test_policy_clause_prefix_match() {
        // Only the leading 60 characters must be verbatim.
        let text = format!("{} River flooding is covered in full.", WATER_LINE);
        let report = verify(
            json!({"generated_policy_clauses": [
                {"section_number": "2.3", "clause_type": "coverage",
                 "clause_text": text, "impact_on_claim": "supports"}
            ]}),
            SAMPLE_POLICY,
        );
        assert!(report.failed_excerpts.is_empty(), "{:?}", report.failed_excerpts);
        assert!(!report.hallucination_detected());
        assert!(report.valid_excerpt_refs.contains("2.3"));
    }

    #[test]
    fn test_policy_clause_with_fabricated_prefix_flagged() {
        let report = verify(
            json!({"generated_policy_clauses": [
                {"section_number": "2.3",
                 "clause_text": format!("River flooding is covered in full. {}", WATER_LINE)}
            ]}),
            SAMPLE_POLICY,
        );
        assert_eq!(report.failed_excerpts.len(), 1);
        assert_eq!(
            report.failed_excerpts[0].reason,
            "Clause text not found as substring in policy document"
        );
    }

    #[test]
    fn test_citation_quote_checked_in_full() {
        let quote = format!("{} River flooding is covered in full.", WATER_LINE);
        let report = verify(
            json!({"policy_text_citations": [{"section_number": "2.3", "quoted_text": quote}]}),
            SAMPLE_POLICY,
        );
        assert!(report.failed_sections.is_empty());
        assert_eq!(report.failed_excerpts.len(), 1);
        assert_eq!(report.failed_excerpts[0].index, FindingIndex::Citation(0));
        assert_eq!(
            report.failed_excerpts[0].reason,
            "Quoted text not found as substring in policy document"
        );
    }

    #[test]
    fn test_numeric_section_number_fails() {
        let report = verify(
            json!({
                "generated_clauses": [{"section_number": 2.3, "clause_excerpt": "Burst pipes"}],
                "policy_text_citations": [{"section_number": 2.3, "quoted_text": "Burst pipes"}]
            }),
            WATER_DOC,
        );
        assert!(report.hallucination_detected());
        assert!(report.valid_section_refs.is_empty());
        assert_eq!(report.failed_sections.len(), 2);
        assert_eq!(
            report.failed_sections[0].reason,
            "Section '2.3' not found in policy document"
        );
        assert_eq!(
            report.failed_sections[1].reason,
            "Citation section '2.3' not found in policy document"
        );
    }

    #[test]
    fn test_legacy_impact_key_not_validated_on_policy_clause() {
        let report = verify(
            json!({"generated_policy_clauses": [{"section_number": "2.3", "impact": "positive"}]}),
            WATER_DOC,
        );
        assert!(!report.hallucination_detected(), "{:?}", report.failed_sections);
    }

    #[test]
    fn test_short_policy_clause_text_skipped() {
        let report = verify(
            json!({"generated_policy_clauses": [
                {"section_number": "2.3", "clause_text": "short placeholder"}
            ]}),
            WATER_DOC,
        );
        assert!(!report.hallucination_detected());
        assert!(report.valid_excerpt_refs.is_empty());
    }

    #[test]
    fn test_legacy_excerpt_checked_in_full() {
        let report = verify(
            json!({"generated_clauses": [
                {"section_number": "2.3", "clause_excerpt": "Burst pipes and plumbing failures are covered. Also floods."}
            ]}),
            WATER_DOC,
        );
        assert_eq!(report.failed_excerpts.len(), 1);
    }

    #[test]
    fn test_citation_findings_use_citation_index() {
        let report = verify(
            json!({"policy_text_citations": [
                {"section_number": "2.3", "quoted_text": "Burst pipes"},
                {"section_number": "7.7", "quoted_text": "Invented wording"}
            ]}),
            WATER_DOC,
        );
        assert_eq!(report.total_citations_checked, 2);
        assert_eq!(report.failed_sections.len(), 1);
        assert_eq!(report.failed_sections[0].index, FindingIndex::Citation(1));
        assert_eq!(
            report.failed_sections[0].reason,
            "Citation section '7.7' not found in policy document"
        );
        assert_eq!(report.failed_excerpts[0].index, FindingIndex::Citation(1));
    }

    #[test]
    fn test_invalid_enum_values_reported_as_section_findings() {
        let report = verify(
            json!({"generated_policy_clauses": [
                {"section_number": "2.3", "clause_type": "loophole", "impact_on_claim": "maybe"}
            ]}),
            WATER_DOC,
        );
        assert_eq!(report.failed_sections.len(), 2);
        assert_eq!(
            report.failed_sections[0].reason,
            "Invalid clause_type 'loophole' — must be coverage|exclusion|condition"
        );
        assert_eq!(
            report.failed_sections[1].reason,
            "Invalid impact_on_claim 'maybe' — must be supports|exclusion|conditional"
        );
        assert!(report.valid_section_refs.contains("2.3"));
    }

    #[test]
    fn test_empty_output_is_clean() {
        let report = verify(json!({}), SAMPLE_POLICY);
        assert!(!report.hallucination_detected());
        assert_eq!(report.total_clauses_checked, 0);
        assert_eq!(report.total_citations_checked, 0);
        assert!(report.policy_sections_available.contains(&"2.3".to_string()));
    }

    #[test]
    fn test_available_sections_not_filtered_by_citations() {
        let report = verify(
            json!({"generated_clauses": [{"section_number": "2.3", "clause_excerpt": ""}]}),
            SAMPLE_POLICY,
        );
        let doc = PolicyDocument::new(SAMPLE_POLICY);
        assert_eq!(report.policy_sections_available, doc.sorted_sections());
    }

    #[test]
    fn test_sample_policy_grounding() {
        let report = verify(
            json!({
                "generated_clauses": [
                    {"section_number": "2.3", "section_title": "WATER DAMAGE",
                     "clause_excerpt": "Burst pipes and plumbing failures", "impact": "supports"},
                    {"section_number": "3.1", "section_title": "FLOOD DAMAGE",
                     "clause_excerpt": "Damage caused by rising water", "impact": "exclusion"}
                ],
                "policy_text_citations": [
                    {"section_number": "1.1",
                     "quoted_text": "Covers damage to the physical structure of your home"}
                ]
            }),
            SAMPLE_POLICY,
        );
        assert!(!report.hallucination_detected(), "{:?}", report);
        assert_eq!(report.total_clauses_checked, 2);
        assert_eq!(report.total_citations_checked, 1);
    }

    #[test]
    fn test_verify_returns_output_unchanged() {
        let raw = json!({"decision": "approved", "generated_clauses": [{"section_number": "9.9"}]});
        let doc = PolicyDocument::new(WATER_DOC);
        let (output, report) =
            CitationVerifier::default().verify(ModelOutput::from_value(raw.clone()), &doc);
        assert_eq!(output.raw(), &raw);
        assert!(report.hallucination_detected());
    }

    #[test]
    fn test_char_prefix_multibyte() {
        assert_eq!(char_prefix("héllo", 2), "hé");
        assert_eq!(char_prefix("abc", 10), "abc");
        assert_eq!(char_prefix("", 3), "");
    }
}
