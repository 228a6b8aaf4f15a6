//! Deterministic offline client.
//!
//! Produces keyword-driven claim decisions from the claim details block of
//! the analysis prompt. Used when no API key is configured and in tests; the
//! same prompt always yields the same response.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

use crate::error::Result;
use crate::prompts::{CLAIM_DETAILS_HEADER, POLICY_CONTEXT_HEADER, TOOL_RESULTS_HEADER};
use crate::replay::compute_text_hash;

use super::client::LLMClient;
use super::types::{
    CompletionRequest, CompletionResponse, ModelSpec, Provider, StopReason, TokenUsage,
};

static SECTION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+\.\d+)\s+([A-Z][^\n]*)$").expect("valid section line regex")
});

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Claimed Amount: \$([0-9,]+(?:\.[0-9]+)?)").expect("valid amount regex")
});

const HIGH_VALUE_MARKERS: [&str; 4] = ["25,000", "45,000", "48,000", "52,000"];

/// Keyword-driven stand-in for a real model.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClient;

impl SimulatedClient {
    pub fn new() -> Self {
        Self
    }

    /// Render the JSON answer for one prompt.
    pub fn respond(&self, prompt: &str) -> String {
        let details = section_between(prompt, CLAIM_DETAILS_HEADER, POLICY_CONTEXT_HEADER)
            .unwrap_or(prompt)
            .to_lowercase();

        let (decision, confidence, reasoning) =
            if details.contains("fraud") || details.contains("suspicious") {
                (
                    "escalated",
                    0.65,
                    "Multiple fraud indicators detected. Claim requires investigation by the Special Investigations Unit before processing.",
                )
            } else if details.contains("not covered")
                || details.contains("exclusion")
                || details.contains("flood")
            {
                (
                    "rejected",
                    0.88,
                    "Claim falls under a policy exclusion. The claimed peril is not covered under the current policy terms.",
                )
            } else if HIGH_VALUE_MARKERS.iter().any(|m| details.contains(m)) {
                (
                    "escalated",
                    0.75,
                    "High-value claim exceeding the $25,000 threshold. Requires senior claims supervisor approval.",
                )
            } else {
                (
                    "approved",
                    0.9,
                    "Claim is valid and falls within policy coverage. Documentation requirements met. Payout calculated per standard ACV method.",
                )
            };

        let payout = match decision {
            "rejected" => None,
            _ => claimed_amount(prompt),
        };

        let context =
            section_between(prompt, POLICY_CONTEXT_HEADER, TOOL_RESULTS_HEADER).unwrap_or("");
        let (clauses, citations) = match first_section_quote(context) {
            Some((number, title, quote)) => {
                let (clause_type, impact) = if decision == "rejected" {
                    ("exclusion", "exclusion")
                } else {
                    ("coverage", "supports")
                };
                (
                    json!([{
                        "section_number": number,
                        "section_title": title,
                        "clause_type": clause_type,
                        "clause_text": quote,
                        "impact_on_claim": impact,
                    }]),
                    json!([{ "section_number": number, "quoted_text": quote }]),
                )
            }
            None => (json!([]), json!([])),
        };

        let conditions: Vec<&str> = match decision {
            "approved" => vec!["Standard documentation verification required"],
            _ => Vec::new(),
        };
        let risk_flags: Vec<&str> = match decision {
            "escalated" => vec!["Requires SIU review"],
            _ => Vec::new(),
        };

        let body = json!({
            "decision": decision,
            "confidence": confidence,
            "reasoning": reasoning,
            "payout_amount": payout,
            "conditions": conditions,
            "risk_flags": risk_flags,
            "compliance_notes": "Decision compliant with state insurance regulations.",
            "generated_policy_clauses": clauses,
            "policy_text_citations": citations,
        });

        serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
    }
}

#[async_trait]
impl LLMClient for SimulatedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let content = self.respond(&prompt);

        let usage = TokenUsage {
            input_tokens: request.prompt_text().split_whitespace().count() as u64 * 2,
            output_tokens: content.split_whitespace().count() as u64 * 2,
        };

        let digest = compute_text_hash(&prompt);

        Ok(CompletionResponse {
            id: format!("sim-{}", &digest[..12]),
            model: ModelSpec::simulated().id,
            content,
            stop_reason: Some(StopReason::EndTurn),
            usage,
            timestamp: Utc::now(),
            cost: Some(0.0),
        })
    }

    fn provider(&self) -> Provider {
        Provider::Simulated
    }

    fn available_models(&self) -> Vec<ModelSpec> {
        vec![ModelSpec::simulated()]
    }
}

fn section_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    Some(rest.find(end).map_or(rest, |to| &rest[..to]))
}

fn claimed_amount(prompt: &str) -> Option<f64> {
    AMOUNT_RE
        .captures(prompt)
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
}

/// First section header in the context and the next non-empty line under it.
fn first_section_quote(context: &str) -> Option<(String, String, String)> {
    let mut lines = context.lines();
    while let Some(line) = lines.next() {
        if let Some(caps) = SECTION_LINE_RE.captures(line) {
            let quote = lines.by_ref().map(str::trim).find(|l| !l.is_empty())?;
            return Some((caps[1].to_string(), caps[2].trim().to_string(), quote.to_string()));
        }
    }
    None
}
