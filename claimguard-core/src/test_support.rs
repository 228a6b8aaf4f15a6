//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::claim::{ClaimContext, ClaimInput, ToolResults};
use crate::coverage::CoverageResult;
use crate::error::{Error, Result};
use crate::llm::{
    CompletionRequest, CompletionResponse, LLMClient, ModelSpec, Provider, StopReason, TokenUsage,
};

pub const SAMPLE_POLICY: &str = "\
SAFEGUARD INSURANCE POLICY
Homeowners Comprehensive Coverage

SECTION 1: COVERAGES

1.1 DWELLING COVERAGE (A)
Covers damage to the physical structure of your home, including attached structures.

1.5 PERSONAL LIABILITY COVERAGE (E)
Protects against lawsuits for bodily injury or property damage to others.

1.6 MEDICAL PAYMENTS COVERAGE (F)
Medical expenses are covered regardless of fault, up to $5,000 per person.

SECTION 2: COVERED PERILS

2.1 FIRE AND LIGHTNING
All fire damage is covered, including smoke damage and water used to fight the fire.

2.2 WINDSTORM AND HAIL
Damage from severe wind events is covered. A separate deductible applies.

2.3 WATER DAMAGE
Burst pipes and plumbing failures are covered. Flood damage is excluded under Section 3.1.

2.4 THEFT AND VANDALISM
Theft is covered when a police report is filed within 48 hours.

SECTION 3: EXCLUSIONS

3.1 FLOOD DAMAGE
Damage caused by rising water, storm surge, or overflow of bodies of water is not covered.

3.3 NEGLECT AND MAINTENANCE
Foundation settling and damage from wear and tear or lack of maintenance are excluded.

SECTION 5: AUTO

5.4 AUTO INSURANCE COVERAGE
Collision coverage applies to damage to the insured vehicle in an accident.
";

/// Water-damage claim against [`SAMPLE_POLICY`].
pub fn water_claim() -> ClaimContext {
    ClaimContext::new(
        ClaimInput::new("CLM-1001", "water_damage")
            .with_description("Pipe burst under the kitchen sink and soaked the cabinets")
            .with_amount(8500.0)
            .with_policy("POL-2024-001")
            .with_incident_date("2024-03-02"),
        ToolResults {
            policy_lookup: json!({"policy_id": "POL-2024-001", "status": "active"}),
            coverage: CoverageResult::covered("POL-2.3-WATER", "Water Damage")
                .with_notes("Burst pipes and plumbing failures are covered."),
            payout: json!({"payout": 6725.0}),
        },
        "2.3 WATER DAMAGE\nBurst pipes and plumbing failures are covered. Flood damage is excluded under Section 3.1.",
    )
}

/// Grounded model answer for [`water_claim`].
pub fn grounded_response() -> String {
    json!({
        "decision": "approved",
        "confidence": 0.9,
        "reasoning": "Burst pipe is a covered peril.",
        "payout_amount": 6725.0,
        "generated_policy_clauses": [{
            "section_number": "2.3",
            "section_title": "WATER DAMAGE",
            "clause_type": "coverage",
            "clause_text": "Burst pipes and plumbing failures are covered.",
            "impact_on_claim": "supports"
        }],
        "policy_text_citations": [
            {"section_number": "2.3", "quoted_text": "Burst pipes and plumbing failures are covered."}
        ]
    })
    .to_string()
}

/// Answer citing a section the policy does not define.
pub fn hallucinated_response() -> String {
    json!({
        "decision": "approved",
        "confidence": 0.9,
        "reasoning": "Covered under the alien invasion rider.",
        "generated_clauses": [
            {"section_number": "99.9", "clause_excerpt": "Covers alien invasions", "impact": "supports"}
        ]
    })
    .to_string()
}

/// Client that replays queued responses and records every request.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    pub fn push_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::llm_api("scripted", message)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::llm_api("scripted", "script exhausted")));

        next.map(|content| CompletionResponse {
            id: format!("scripted-{}", self.calls()),
            model: "scripted".to_string(),
            content,
            stop_reason: Some(StopReason::EndTurn),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 10,
            },
            timestamp: Utc::now(),
            cost: Some(0.001),
        })
    }

    fn provider(&self) -> Provider {
        Provider::Simulated
    }

    fn available_models(&self) -> Vec<ModelSpec> {
        vec![ModelSpec::simulated()]
    }
}
