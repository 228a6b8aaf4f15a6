//! Claim analysis prompt construction.
//!
//! First-pass and retry prompts come from the same builder; the retry only
//! adds a [`StrictMode`] block to the system instruction, so the user-facing
//! content of both calls is identical.

use serde::Serialize;

use crate::claim::ClaimContext;
use crate::config::LlmOptions;
use crate::grounding::{char_prefix, HallucinationReport};
use crate::llm::{ChatMessage, CompletionRequest};

pub(crate) const CLAIM_DETAILS_HEADER: &str = "CLAIM DETAILS:";
pub(crate) const POLICY_CONTEXT_HEADER: &str = "POLICY CONTEXT:";
pub(crate) const TOOL_RESULTS_HEADER: &str = "TOOL RESULTS:";

/// Tool results are cut to this many characters in the prompt.
pub const TOOL_RESULT_PREVIEW_CHARS: usize = 300;

const ANALYST_SYSTEM_PROMPT: &str = "\
You are a senior insurance claims analyst for Safeguard Insurance Company.
Evaluate each claim against the policy terms with precision and fairness.

Responsibilities:
1. Check the claim against the covered perils and the policy exclusions.
2. Confirm the payout respects deductibles and limits.
3. Note any risk indicators that need investigation.
4. Recommend one decision: approved, rejected or escalated.

Decision framework:
- approved: the claim is within coverage and the amount is reasonable
- rejected: an exclusion applies, the policy lapsed, or evidence is insufficient
- escalated: the claim is high value (over $25,000), coverage is ambiguous, or senior review is needed

Cite policy sections only from the POLICY CONTEXT you are given, and copy clause text from it verbatim.";

/// Feedback for the single grounding retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrictMode {
    /// Section numbers the previous answer cited that the policy does not define
    pub invalid_sections: Vec<String>,
    /// Every section the policy defines
    pub valid_sections: Vec<String>,
    /// Number of quoted spans that were not found verbatim
    pub ungrounded_excerpts: usize,
}

impl StrictMode {
    pub fn from_report(report: &HallucinationReport) -> Self {
        Self {
            invalid_sections: report.invalid_section_numbers(),
            valid_sections: report.policy_sections_available.clone(),
            ungrounded_excerpts: report.failed_excerpts.len(),
        }
    }

    fn render(&self) -> String {
        let mut out = String::from("GROUNDING CORRECTION:\n");
        if !self.invalid_sections.is_empty() {
            out.push_str(&format!(
                "Your previous answer cited sections that do not exist in the policy: {}\n",
                self.invalid_sections.join(", ")
            ));
        }
        if self.ungrounded_excerpts > 0 {
            out.push_str(&format!(
                "Your previous answer quoted {} passage(s) that do not appear in the policy text.\n",
                self.ungrounded_excerpts
            ));
        }
        let valid = if self.valid_sections.is_empty() {
            "(none)".to_string()
        } else {
            self.valid_sections.join(", ")
        };
        out.push_str(&format!("Valid section numbers: {}\n", valid));
        out.push_str("Rules:\n");
        out.push_str("1. Only cite section numbers from the valid list above.\n");
        out.push_str(
            "2. Copy every clause_text and quoted_text verbatim from the policy. Do not paraphrase.\n",
        );
        out
    }
}

/// A rendered prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
}

impl AnalysisPrompt {
    pub fn to_request(&self, options: &LlmOptions) -> CompletionRequest {
        let request = CompletionRequest::new()
            .with_system(self.system.clone())
            .with_message(ChatMessage::user(self.user.clone()))
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens)
            .with_json_response(true);

        match &options.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }
}

/// Builds the claim analysis prompt, optionally in strict mode.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(context: &ClaimContext, strict: Option<&StrictMode>) -> AnalysisPrompt {
        let system = match strict {
            Some(mode) => format!("{}\n\n{}", ANALYST_SYSTEM_PROMPT, mode.render()),
            None => ANALYST_SYSTEM_PROMPT.to_string(),
        };

        AnalysisPrompt {
            system,
            user: render_user_prompt(context),
        }
    }
}

fn render_user_prompt(context: &ClaimContext) -> String {
    let claim = &context.claim;
    let coverage_status = if context.coverage().covered {
        "Covered"
    } else {
        "Not Covered"
    };

    format!(
        "Analyze the following insurance claim and provide a detailed assessment.

{claim_header}
- Claim ID: {claim_id}
- Claim Type: {claim_type}
- Description: {description}
- Claimed Amount: ${amount}
- Policy ID: {policy_id}
- Date of Incident: {date}
- Coverage Status: {coverage_status}

{context_header}
{policy_context}

{tools_header}
- Policy Lookup: {policy_lookup}
- Coverage Check: {coverage}
- Payout Calculation: {payout}

Respond with a single JSON object:
{{
  \"decision\": \"approved\" | \"rejected\" | \"escalated\",
  \"confidence\": 0.0 to 1.0,
  \"reasoning\": \"explanation of the decision\",
  \"payout_amount\": number or null,
  \"conditions\": [\"conditions attached to an approval\"],
  \"risk_flags\": [\"risk indicators noted\"],
  \"compliance_notes\": \"regulatory notes\",
  \"generated_policy_clauses\": [
    {{\"section_number\": \"2.3\", \"section_title\": \"heading\", \"clause_type\": \"coverage\" | \"exclusion\" | \"condition\", \"clause_text\": \"text copied verbatim from POLICY CONTEXT\", \"impact_on_claim\": \"supports\" | \"exclusion\" | \"conditional\"}}
  ],
  \"policy_text_citations\": [
    {{\"section_number\": \"2.3\", \"quoted_text\": \"text copied verbatim from POLICY CONTEXT\"}}
  ]
}}",
        claim_header = CLAIM_DETAILS_HEADER,
        claim_id = claim.claim_id,
        claim_type = claim.claim_type,
        description = claim.description,
        amount = format_amount(claim.amount),
        policy_id = claim.policy_id,
        date = claim.date_of_incident,
        coverage_status = coverage_status,
        context_header = POLICY_CONTEXT_HEADER,
        policy_context = context.retrieved_context,
        tools_header = TOOL_RESULTS_HEADER,
        policy_lookup = preview_json(&context.tools.policy_lookup),
        coverage = preview_json(&context.tools.coverage),
        payout = preview_json(&context.tools.payout),
    )
}

/// Compact JSON rendering cut to [`TOOL_RESULT_PREVIEW_CHARS`].
fn preview_json<T: Serialize>(value: &T) -> String {
    let rendered = serde_json::to_string(value).unwrap_or_default();
    char_prefix(&rendered, TOOL_RESULT_PREVIEW_CHARS).to_string()
}

/// `12345.5` -> `"12,345.50"`.
pub(crate) fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{ClaimInput, ToolResults};
    use crate::coverage::CoverageResult;
    use serde_json::json;

    fn context() -> ClaimContext {
        ClaimContext::new(
            ClaimInput::new("CLM-001", "water_damage")
                .with_description("Pipe burst in the kitchen")
                .with_amount(8500.0)
                .with_policy("POL-1001"),
            ToolResults {
                policy_lookup: json!({"policy_id": "POL-1001", "notes": "x".repeat(600)}),
                coverage: CoverageResult::covered("POL-2.3-WATER", "Water Damage"),
                payout: json!({"payout": 6725.0}),
            },
            "2.3 WATER DAMAGE\nBurst pipes and plumbing failures are covered.",
        )
    }

    #[test]
    fn test_first_pass_prompt() {
        let prompt = PromptBuilder::build(&context(), None);
        assert!(prompt.user.contains("- Claim ID: CLM-001"));
        assert!(prompt.user.contains("- Claimed Amount: $8,500.00"));
        assert!(prompt.user.contains("Burst pipes and plumbing failures are covered."));
        assert!(prompt.user.contains("generated_policy_clauses"));
        assert!(!prompt.system.contains("GROUNDING CORRECTION"));
    }

    #[test]
    fn test_tool_results_truncated() {
        let prompt = PromptBuilder::build(&context(), None);
        let line = prompt
            .user
            .lines()
            .find(|l| l.starts_with("- Policy Lookup: "))
            .unwrap();
        let rendered = line.trim_start_matches("- Policy Lookup: ");
        assert_eq!(rendered.chars().count(), TOOL_RESULT_PREVIEW_CHARS);
    }

    #[test]
    fn test_strict_mode_keeps_user_prompt() {
        let strict = StrictMode {
            invalid_sections: vec!["99.9".to_string()],
            valid_sections: vec!["2.3".to_string(), "3.1".to_string()],
            ungrounded_excerpts: 1,
        };
        let first = PromptBuilder::build(&context(), None);
        let retry = PromptBuilder::build(&context(), Some(&strict));

        assert_eq!(first.user, retry.user);
        assert!(retry.system.starts_with(&first.system));
        assert!(retry.system.contains("99.9"));
        assert!(retry.system.contains("Valid section numbers: 2.3, 3.1"));
        assert!(retry.system.contains("Only cite section numbers from the valid list"));
        assert!(retry.system.contains("Do not paraphrase"));
    }

    #[test]
    fn test_to_request() {
        let prompt = PromptBuilder::build(&context(), None);
        let options = LlmOptions {
            model: Some("openai/gpt-4o".to_string()),
            ..LlmOptions::default()
        };
        let request = prompt.to_request(&options);
        assert_eq!(request.model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.json_response);
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.999), "1,000.00");
        assert_eq!(format_amount(1234567.5), "1,234,567.50");
        assert_eq!(format_amount(-25000.0), "-25,000.00");
    }
}
