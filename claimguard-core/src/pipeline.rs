//! Claim decision pipeline.
//!
//! prompt -> LLM -> parse -> verify -> (retry) -> content checks ->
//! deterministic overrides -> content escalation -> fraud escalation ->
//! replay hashes -> payload.
//!
//! Processing a claim never fails: collaborator errors, unparsable output
//! and unresolved hallucinations all degrade to a conservative payload.

use chrono::Utc;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::claim::ClaimContext;
use crate::config::PipelineConfig;
use crate::decision::{format_generated_sections, DecisionPayload, DecisionRecord};
use crate::error::Result;
use crate::grounding::{
    escalation_default, parse_or_escalate, CitationVerifier, ClauseShape, GroundingOutcome,
    ModelOutput, PolicyCache, PolicyDocument, RetryController,
};
use crate::guardrails::{apply_deterministic_guardrails, escalate_on_failure, run_content_checks};
use crate::llm::{default_client, CostTracker, LLMClient, TrackedClient};
use crate::prompts::PromptBuilder;
use crate::replay::ReplayHashes;
use crate::trajectory::{EventLog, PipelineEvent, PipelineEventType};

const FRAUD_PREFIX: &str = "Fraud indicators present in claim data. ";

/// End-to-end claim processor bound to one policy document.
pub struct ClaimsPipeline {
    client: TrackedClient,
    document: Arc<PolicyDocument>,
    config: PipelineConfig,
    events: EventLog,
    controller: RetryController,
}

impl ClaimsPipeline {
    pub fn new(
        client: Arc<dyn LLMClient>,
        document: Arc<PolicyDocument>,
        config: PipelineConfig,
    ) -> Self {
        let events = EventLog::default().with_retention(config.event_retention);
        let controller = RetryController::new(
            CitationVerifier::new(config.verifier.clone()),
            config.llm.clone(),
        )
        .with_retry(config.retry_on_hallucination)
        .with_events(events.clone());

        Self {
            client: TrackedClient::new(client),
            document,
            config,
            events,
            controller,
        }
    }

    /// Build a pipeline over the document held by `cache`, loading it if needed.
    pub async fn from_cache(
        client: Arc<dyn LLMClient>,
        cache: &PolicyCache,
        config: PipelineConfig,
    ) -> Result<Self> {
        let document = cache.get().await?;
        Ok(Self::new(client, document, config))
    }

    /// Environment-configured client and settings over a policy file.
    pub async fn from_env(policy_path: impl AsRef<Path>) -> Result<Self> {
        let document = PolicyDocument::load(policy_path).await?;
        Ok(Self::new(
            default_client()?,
            Arc::new(document),
            PipelineConfig::from_env(),
        ))
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Token usage and cost of every LLM call made so far.
    pub async fn costs(&self) -> CostTracker {
        self.client.get_costs().await
    }

    /// Decide one claim.
    #[instrument(skip_all, fields(claim_id = %context.claim_id()))]
    pub async fn process(&self, context: &ClaimContext) -> DecisionPayload {
        let claim_id = context.claim_id();
        self.events.record(PipelineEvent::start(claim_id)).await;

        let first_pass = self.first_pass(context).await;
        let grounding = self
            .controller
            .ground(&self.client, context, &self.document, first_pass)
            .await;

        let output = &grounding.output;
        let mut record =
            DecisionRecord::new(output.decision(), output.confidence(), output.reasoning());

        // Checks see the model's own decision; overrides are recorded before
        // any escalation so the audit trail keeps every fired rule.
        let guardrails = run_content_checks(&context.claim.description, &record);
        for result in &guardrails {
            self.events
                .record(
                    PipelineEvent::new(
                        PipelineEventType::ContentGuardrail,
                        claim_id,
                        result.details.clone(),
                    )
                    .with_metadata("passed", result.passed),
                )
                .await;
        }

        let overrides =
            apply_deterministic_guardrails(&mut record, context.coverage(), &grounding.output);
        for fired in &overrides {
            self.events
                .record(PipelineEvent::guardrail_override(claim_id, fired.reason.clone()))
                .await;
        }

        if escalate_on_failure(&mut record, &guardrails) {
            warn!("Content guardrail failed, escalating");
        }

        if context.claim.has_fraud_indicators() && record.escalate_unless_rejected(FRAUD_PREFIX) {
            info!(indicators = ?context.claim.fraud_indicators, "Escalated on fraud indicators");
        }

        let hashes = ReplayHashes::compute(self.document.text(), &context.retrieved_context);
        self.events
            .record(
                PipelineEvent::new(
                    PipelineEventType::ReplayHashed,
                    claim_id,
                    "Replay hashes attached",
                )
                .with_metadata("policy_text_hash", hashes.policy_text_hash.clone()),
            )
            .await;

        let payload = build_payload(context, record, grounding, hashes, guardrails);

        info!(
            decision = %payload.decision_type,
            confidence = payload.confidence,
            validation_passed = payload.validation_passed,
            overrides = payload.deterministic_overrides.len(),
            "Claim decided"
        );
        self.events
            .record(
                PipelineEvent::new(
                    PipelineEventType::Final,
                    claim_id,
                    payload.decision_type.to_string(),
                )
                .with_metadata("trace_id", payload.trace_id.to_string()),
            )
            .await;

        payload
    }

    /// Decide independent claims concurrently. Output order follows input.
    pub async fn process_batch(&self, contexts: &[ClaimContext]) -> Vec<DecisionPayload> {
        join_all(contexts.iter().map(|context| self.process(context))).await
    }

    /// First LLM call. Failures degrade to the fixed escalation output.
    async fn first_pass(&self, context: &ClaimContext) -> ModelOutput {
        let claim_id = context.claim_id();
        let request = PromptBuilder::build(context, None).to_request(&self.config.llm);
        let model = request.model.clone().unwrap_or_else(|| "default".to_string());
        self.events
            .record(PipelineEvent::llm_call(claim_id, 1, &model))
            .await;

        match self.client.complete(request).await {
            Ok(response) => {
                let (output, fell_back) = parse_or_escalate(&response.content);
                if fell_back {
                    self.events
                        .record(PipelineEvent::error(claim_id, "Unparsable model response"))
                        .await;
                }
                output
            }
            Err(e) => {
                warn!(error = %e, "LLM call failed, escalating for manual review");
                self.events
                    .record(PipelineEvent::error(claim_id, e.to_string()))
                    .await;
                ModelOutput::from_value(escalation_default())
            }
        }
    }
}

fn build_payload(
    context: &ClaimContext,
    record: DecisionRecord,
    grounding: GroundingOutcome,
    hashes: ReplayHashes,
    guardrails: Vec<crate::guardrails::GuardrailResult>,
) -> DecisionPayload {
    let retry_attempted = grounding.retry_attempted();
    let output = grounding.output;
    let report = grounding.report;
    let escalated_to_human = record.escalated_to_human();

    DecisionPayload {
        trace_id: Uuid::new_v4(),
        claim_id: context.claim_id().to_string(),
        decision_type: record.decision_type,
        confidence: record.confidence,
        reasoning: record.reasoning,
        payout_amount: output.payout_amount(),
        conditions: output.conditions(),
        risk_flags: output.risk_flags(),
        compliance_notes: output.compliance_notes().to_string(),
        coverage_status: context.coverage().status().to_string(),
        clause_attribution: context.coverage().attribution(),
        generated_clauses: output.raw_array(ClauseShape::Legacy.key()),
        generated_policy_clauses: output.raw_array(ClauseShape::Policy.key()),
        policy_text_citations: output.raw_array("policy_text_citations"),
        deterministic_overrides: record.override_reasons,
        policy_text_hash: hashes.policy_text_hash,
        retrieved_context_hash: hashes.retrieved_context_hash,
        llm_generated_sections: format_generated_sections(&output.cited_sections()),
        validation_passed: report.validation_passed(),
        retry_attempted,
        escalated_to_human,
        clause_verification: report,
        guardrails,
        processed_at: Utc::now(),
    }
}
