//! Property-based tests for clause grounding using proptest.
//!
//! - Verification is deterministic for a fixed (output, document) pair
//! - Replay hashes are stable 64-character hex digests
//! - A document without section headers grounds nothing
//! - An output without clauses or citations never hallucinates
//! - The deterministic guardrails never move a decision toward approval

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{json, Value};

    use crate::coverage::CoverageResult;
    use crate::decision::{DecisionRecord, DecisionType};
    use crate::grounding::{CitationVerifier, ModelOutput, PolicyDocument};
    use crate::guardrails::apply_deterministic_guardrails;
    use crate::replay::compute_text_hash;

    fn section_number() -> impl Strategy<Value = String> {
        "[1-9]\\.[0-9]{1,2}"
    }

    // Header line followed by one body line.
    fn policy_section() -> impl Strategy<Value = (String, String, String)> {
        (section_number(), "[A-Z]{3,10}( [A-Z]{3,10})?", "[A-Za-z ,.]{10,80}")
    }

    fn policy_text() -> impl Strategy<Value = String> {
        prop::collection::vec(policy_section(), 0..6).prop_map(|sections| {
            let mut text = String::from("SAFEGUARD INSURANCE POLICY\n");
            for (number, title, body) in sections {
                text.push_str(&format!("\n{} {}\n{}\n", number, title, body));
            }
            text
        })
    }

    fn impact() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("supports".to_string()),
            Just("exclusion".to_string()),
            Just("conditional".to_string()),
            Just(String::new()),
            "[a-z]{3,8}",
        ]
    }

    fn legacy_clause() -> impl Strategy<Value = Value> {
        (section_number(), "[A-Za-z ]{0,40}", impact()).prop_map(|(number, excerpt, impact)| {
            json!({"section_number": number, "clause_excerpt": excerpt, "impact": impact})
        })
    }

    fn policy_clause() -> impl Strategy<Value = Value> {
        (section_number(), "[A-Za-z ]{0,90}", impact(), "[a-z]{0,10}").prop_map(
            |(number, text, impact, clause_type)| {
                json!({
                    "section_number": number,
                    "clause_type": clause_type,
                    "clause_text": text,
                    "impact_on_claim": impact
                })
            },
        )
    }

    fn citation() -> impl Strategy<Value = Value> {
        (section_number(), "[A-Za-z ]{0,40}")
            .prop_map(|(number, quoted)| json!({"section_number": number, "quoted_text": quoted}))
    }

    fn model_output() -> impl Strategy<Value = Value> {
        (
            prop::collection::vec(policy_clause(), 0..4),
            prop::collection::vec(legacy_clause(), 0..4),
            prop::collection::vec(citation(), 0..4),
        )
            .prop_map(|(policy, legacy, citations)| {
                json!({
                    "decision": "approved",
                    "generated_policy_clauses": policy,
                    "generated_clauses": legacy,
                    "policy_text_citations": citations
                })
            })
    }

    fn decision() -> impl Strategy<Value = DecisionType> {
        prop_oneof![
            Just(DecisionType::Approved),
            Just(DecisionType::Rejected),
            Just(DecisionType::Escalated),
        ]
    }

    // =========================================================================
    // Verification
    // =========================================================================

    proptest! {
        /// Repeated verification yields identical reports.
        #[test]
        fn verification_is_deterministic(text in policy_text(), raw in model_output()) {
            let doc = PolicyDocument::new(text);
            let output = ModelOutput::from_value(raw);
            let verifier = CitationVerifier::default();

            let first = verifier.report(&output, &doc);
            let second = verifier.report(&output, &doc);
            prop_assert_eq!(first, second);
        }

        /// The flag is exactly "some finding exists".
        #[test]
        fn flag_matches_findings(text in policy_text(), raw in model_output()) {
            let doc = PolicyDocument::new(text);
            let report = CitationVerifier::default().report(&ModelOutput::from_value(raw), &doc);
            prop_assert_eq!(report.hallucination_detected(), report.finding_count() > 0);
        }

        /// Available sections are the whole document catalogue.
        #[test]
        fn available_sections_are_never_filtered(text in policy_text(), raw in model_output()) {
            let doc = PolicyDocument::new(text);
            let report = CitationVerifier::default().report(&ModelOutput::from_value(raw), &doc);
            prop_assert_eq!(report.policy_sections_available, doc.sorted_sections());
        }

        /// Without section headers every clause or citation fails.
        #[test]
        fn headerless_document_denies_everything(
            text in "[a-z ,.\n]{0,200}",
            raw in model_output()
        ) {
            let doc = PolicyDocument::new(text);
            prop_assert!(doc.sections().is_empty());

            let output = ModelOutput::from_value(raw);
            let report = CitationVerifier::default().report(&output, &doc);
            let checked = report.total_clauses_checked + report.total_citations_checked;
            prop_assert_eq!(report.hallucination_detected(), checked > 0);
        }

        /// An output with no arrays never hallucinates.
        #[test]
        fn empty_output_is_clean(text in policy_text()) {
            let doc = PolicyDocument::new(text);
            let report = CitationVerifier::default().report(&ModelOutput::empty(), &doc);
            prop_assert!(!report.hallucination_detected());
            prop_assert_eq!(report.total_clauses_checked, 0);
            prop_assert_eq!(report.total_citations_checked, 0);
        }

        /// Quoting a body line under its own header is always grounded.
        #[test]
        fn verbatim_quotes_are_grounded(sections in prop::collection::vec(policy_section(), 1..6)) {
            let mut text = String::new();
            for (number, title, body) in &sections {
                text.push_str(&format!("\n{} {}\n{}\n", number, title, body));
            }
            let doc = PolicyDocument::new(text);

            let citations: Vec<Value> = sections
                .iter()
                .map(|(number, _, body)| json!({"section_number": number, "quoted_text": body}))
                .collect();
            let output = ModelOutput::from_value(json!({"policy_text_citations": citations}));

            let report = CitationVerifier::default().report(&output, &doc);
            prop_assert!(!report.hallucination_detected(), "{:?}", report);
        }
    }

    // =========================================================================
    // Replay hashing
    // =========================================================================

    proptest! {
        /// Hashes are stable lowercase hex of fixed width.
        #[test]
        fn hash_is_stable_hex(text in ".*") {
            let a = compute_text_hash(&text);
            let b = compute_text_hash(&text);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), 64);
            prop_assert!(a.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }

        /// Distinct texts hash differently.
        #[test]
        fn distinct_texts_hash_differently(a in ".*", b in ".*") {
            prop_assume!(a != b);
            prop_assert_ne!(compute_text_hash(&a), compute_text_hash(&b));
        }
    }

    // =========================================================================
    // Deterministic guardrails
    // =========================================================================

    proptest! {
        /// Overrides only ever move approved to rejected, and at most once.
        #[test]
        fn guardrails_are_monotonic(
            start in decision(),
            covered in any::<bool>(),
            codes in prop::collection::vec("[a-z_]{3,12}", 0..3),
            raw in model_output()
        ) {
            let coverage = CoverageResult {
                covered,
                ..CoverageResult::default()
            }
            .with_triggered_exclusions(codes);
            let output = ModelOutput::from_value(raw);
            let mut record = DecisionRecord::new(start, 0.9, "model");

            let fired = apply_deterministic_guardrails(&mut record, &coverage, &output);

            prop_assert!(fired.len() <= 1);
            prop_assert_eq!(fired.len(), record.override_reasons.len());
            match start {
                DecisionType::Approved => prop_assert!(matches!(
                    record.decision_type,
                    DecisionType::Approved | DecisionType::Rejected
                )),
                other => {
                    prop_assert_eq!(record.decision_type, other);
                    prop_assert!(fired.is_empty());
                }
            }
        }
    }
}
