//! Content guardrails: PII, bias, safety and compliance checks.
//!
//! These run on the claim description and the model's reasoning before the
//! deterministic override chain. A failed check escalates the decision.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::decision::{DecisionRecord, DecisionType};

static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}[-.]?\d{2}[-.]?\d{4}\b").expect("valid SSN regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+1[-.]?)?\(?\b\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").expect("valid phone regex")
});
static CREDIT_CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}[-.\s]?\d{4}[-.\s]?\d{4}[-.\s]?\d{4}\b").expect("valid credit card regex")
});
static NATIONAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}[-.\s]?\d{4}[-.\s]?\d{4}\b").expect("valid national id regex")
});

static UNSAFE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(guarante|promis|assur).*(?:payout|compensat|approve)",
        r"(?i)ignore.*(?:policy|guideline|rule|regulation)",
        r"(?i)override.*(?:threshold|limit|restriction)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid safety regex"))
    .collect()
});

const PII_KEYWORDS: [&str; 4] = ["ssn", "social security", "credit card", "bank account"];

const BIAS_KEYWORDS: [&str; 7] = [
    "because of their age",
    "due to their gender",
    "based on their race",
    "because they are",
    "typical for their demographic",
    "statistically their group",
    "people like them",
];

/// Rejections below this confidence fail fair-claims-handling review.
pub const MIN_REJECTION_CONFIDENCE: f64 = 0.7;

/// Confidence ceiling applied when a content guardrail escalates.
pub const ESCALATION_CONFIDENCE_CAP: f64 = 0.65;

/// Kind of content check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailCheck {
    Pii,
    Bias,
    Safety,
    Compliance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    pub severity: Severity,
    pub detail: String,
}

/// Result of one content check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailResult {
    pub check_type: GuardrailCheck,
    pub passed: bool,
    pub details: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<GuardrailViolation>,
}

impl GuardrailResult {
    fn from_violations(
        check_type: GuardrailCheck,
        violations: Vec<GuardrailViolation>,
        pass_details: &str,
        fail_details: &str,
    ) -> Self {
        let passed = violations.is_empty();
        Self {
            check_type,
            passed,
            details: if passed { pass_details } else { fail_details }.to_string(),
            violations,
        }
    }
}

/// PII patterns and keyword indicators.
pub fn check_pii(text: &str) -> GuardrailResult {
    let mut violations = Vec::new();
    let mut flag = |severity, detail: &str| {
        violations.push(GuardrailViolation {
            severity,
            detail: detail.to_string(),
        })
    };

    if SSN_RE.is_match(text) {
        flag(Severity::Critical, "SSN pattern detected in text");
    }
    if EMAIL_RE.is_match(text) {
        flag(Severity::Warning, "Email address detected in text");
    }
    if PHONE_RE.is_match(text) {
        flag(Severity::Warning, "Phone number detected in text");
    }
    if CREDIT_CARD_RE.is_match(text) {
        flag(Severity::Critical, "Credit card number pattern detected");
    }

    let lower = text.to_lowercase();
    for keyword in PII_KEYWORDS.iter().filter(|k| lower.contains(*k)) {
        flag(
            Severity::Warning,
            &format!("PII indicator '{}' found in text", keyword),
        );
    }

    GuardrailResult::from_violations(
        GuardrailCheck::Pii,
        violations,
        "No PII detected in claim data",
        "Potential PII detected, redaction recommended",
    )
}

/// Bias-indicating phrasing.
pub fn check_bias(text: &str) -> GuardrailResult {
    let lower = text.to_lowercase();
    let violations = BIAS_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| GuardrailViolation {
            severity: Severity::Warning,
            detail: format!("Potential bias indicator: '{}' found in output", k),
        })
        .collect();

    GuardrailResult::from_violations(
        GuardrailCheck::Bias,
        violations,
        "No bias indicators detected in decision rationale",
        "Bias indicators detected in decision rationale",
    )
}

/// Promises, policy bypasses and limit overrides.
pub fn check_safety(text: &str) -> GuardrailResult {
    let violations = UNSAFE_RES
        .iter()
        .filter_map(|re| re.find(text))
        .map(|m| GuardrailViolation {
            severity: Severity::Warning,
            detail: format!(
                "Safety concern: '{}' may overstep the agent's authority",
                m.as_str()
            ),
        })
        .collect();

    GuardrailResult::from_violations(
        GuardrailCheck::Safety,
        violations,
        "No unsafe commitments in decision rationale",
        "Decision rationale oversteps the agent's authority",
    )
}

/// Fair-claims-handling rule on the model's proposed decision.
pub fn check_compliance(decision: DecisionType, confidence: f64) -> GuardrailResult {
    let violations = if decision == DecisionType::Rejected && confidence < MIN_REJECTION_CONFIDENCE
    {
        vec![GuardrailViolation {
            severity: Severity::Critical,
            detail: format!(
                "Rejection confidence {:.2} is below {:.2}",
                confidence, MIN_REJECTION_CONFIDENCE
            ),
        }]
    } else {
        Vec::new()
    };

    GuardrailResult::from_violations(
        GuardrailCheck::Compliance,
        violations,
        "Decision compliant with insurance regulations",
        "Low-confidence rejection may violate fair claims handling requirements",
    )
}

/// Run all content checks for one claim.
///
/// PII is checked on the description and reasoning together; bias and
/// safety on the reasoning alone.
pub fn run_content_checks(description: &str, record: &DecisionRecord) -> Vec<GuardrailResult> {
    let combined = format!("{} {}", description, record.reasoning);
    vec![
        check_pii(&combined),
        check_compliance(record.decision_type, record.confidence),
        check_bias(&record.reasoning),
        check_safety(&record.reasoning),
    ]
}

/// Escalate `record` when any check failed. Returns whether it did.
pub fn escalate_on_failure(record: &mut DecisionRecord, results: &[GuardrailResult]) -> bool {
    if results.iter().all(|r| r.passed) {
        return false;
    }
    record.decision_type = DecisionType::Escalated;
    record.confidence = record.confidence.min(ESCALATION_CONFIDENCE_CAP);
    record.reasoning = format!(
        "Escalated due to failed guardrail checks. Original: {}",
        record.reasoning
    );
    true
}

/// Replace PII matches with redaction markers.
pub fn redact_pii(text: &str) -> String {
    let text = SSN_RE.replace_all(text, "[SSN_REDACTED]");
    let text = EMAIL_RE.replace_all(&text, "[EMAIL_REDACTED]");
    let text = PHONE_RE.replace_all(&text, "[PHONE_REDACTED]");
    let text = CREDIT_CARD_RE.replace_all(&text, "[CC_REDACTED]");
    let text = NATIONAL_ID_RE.replace_all(&text, "[ID_REDACTED]");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pii_patterns() {
        let result = check_pii("Contact me at jane@example.com, SSN 123-45-6789");
        assert!(!result.passed);
        assert!(result
            .violations
            .iter()
            .any(|v| v.severity == Severity::Critical));
        assert!(result.violations.iter().any(|v| v.detail.contains("Email")));
    }

    #[test]
    fn test_pii_keyword() {
        let result = check_pii("Please deposit into my bank account");
        assert!(!result.passed);
        assert_eq!(result.details, "Potential PII detected, redaction recommended");
    }

    #[test]
    fn test_clean_text_passes() {
        let text = "Pipe burst in the kitchen, water damage to cabinets.";
        assert!(check_pii(text).passed);
        assert!(check_bias(text).passed);
        assert!(check_safety(text).passed);
    }

    #[test]
    fn test_bias_and_safety() {
        assert!(!check_bias("Denied because of their age").passed);
        let safety = check_safety("We guarantee the payout will arrive");
        assert!(!safety.passed);
        assert!(!check_safety("Ignore the policy limits here").passed);
    }

    #[test]
    fn test_compliance_low_confidence_rejection() {
        assert!(!check_compliance(DecisionType::Rejected, 0.6).passed);
        assert!(check_compliance(DecisionType::Rejected, 0.7).passed);
        assert!(check_compliance(DecisionType::Approved, 0.1).passed);
    }

    #[test]
    fn test_escalate_on_failure() {
        let mut record = DecisionRecord::new(DecisionType::Rejected, 0.6, "Exclusion applies");
        let results = run_content_checks("Pipe burst", &record);
        assert!(escalate_on_failure(&mut record, &results));
        assert_eq!(record.decision_type, DecisionType::Escalated);
        assert_eq!(record.confidence, 0.6);
        assert!(record
            .reasoning
            .starts_with("Escalated due to failed guardrail checks. Original: "));

        let mut ok = DecisionRecord::new(DecisionType::Approved, 0.9, "Covered peril");
        let results = run_content_checks("Pipe burst", &ok);
        assert!(!escalate_on_failure(&mut ok, &results));
        assert_eq!(ok.decision_type, DecisionType::Approved);
    }

    #[test]
    fn test_escalation_caps_confidence() {
        let mut record = DecisionRecord::new(DecisionType::Approved, 0.95, "ok");
        let failing = vec![check_pii("ssn on file")];
        escalate_on_failure(&mut record, &failing);
        assert_eq!(record.confidence, ESCALATION_CONFIDENCE_CAP);
    }

    #[test]
    fn test_redact_pii() {
        let redacted = redact_pii("SSN 123-45-6789, mail bob@corp.io, card 4111 1111 1111 1111");
        assert!(redacted.contains("[SSN_REDACTED]"));
        assert!(redacted.contains("[EMAIL_REDACTED]"));
        assert!(redacted.contains("[CC_REDACTED]"));
        assert!(!redacted.contains("6789"));
        assert!(!redacted.contains("bob@corp.io"));
    }
}
