//! Claim input and the tool results that accompany it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coverage::CoverageResult;

/// A single insurance claim submitted for processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimInput {
    pub claim_id: String,
    /// Claim type key, e.g. "water_damage"
    pub claim_type: String,
    pub description: String,
    pub amount: f64,
    pub policy_id: String,
    pub date_of_incident: String,
    /// Fraud signals attached upstream; any entry forces escalation
    pub fraud_indicators: Vec<String>,
}

impl ClaimInput {
    pub fn new(claim_id: impl Into<String>, claim_type: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            claim_type: claim_type.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = policy_id.into();
        self
    }

    pub fn with_incident_date(mut self, date: impl Into<String>) -> Self {
        self.date_of_incident = date.into();
        self
    }

    pub fn with_fraud_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.fraud_indicators.push(indicator.into());
        self
    }

    pub fn has_fraud_indicators(&self) -> bool {
        !self.fraud_indicators.is_empty()
    }
}

/// Results of the deterministic rule tools run before the LLM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolResults {
    pub policy_lookup: Value,
    pub coverage: CoverageResult,
    pub payout: Value,
}

/// Everything the pipeline needs to decide one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimContext {
    pub claim: ClaimInput,
    pub tools: ToolResults,
    /// Policy excerpt retrieved for this claim, hashed into the payload
    pub retrieved_context: String,
}

impl ClaimContext {
    pub fn new(
        claim: ClaimInput,
        tools: ToolResults,
        retrieved_context: impl Into<String>,
    ) -> Self {
        Self {
            claim,
            tools,
            retrieved_context: retrieved_context.into(),
        }
    }

    pub fn claim_id(&self) -> &str {
        &self.claim.claim_id
    }

    pub fn coverage(&self) -> &CoverageResult {
        &self.tools.coverage
    }
}
