//! Bounded retry-with-feedback when grounding fails.
//!
//! Two states, [`RetryState::FirstPass`] and [`RetryState::Retried`]. A
//! failed first report moves to `Retried` through exactly one strict
//! re-prompt; `Retried` is terminal. Verification therefore runs at most
//! twice per claim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::claim::ClaimContext;
use crate::config::LlmOptions;
use crate::llm::LLMClient;
use crate::prompts::{PromptBuilder, StrictMode};
use crate::trajectory::{EventLog, PipelineEvent, PipelineEventType};

use super::extract::parse_model_json;
use super::sections::PolicyDocument;
use super::types::{HallucinationReport, ModelOutput, RetryOutcome};
use super::verifier::CitationVerifier;

/// Maximum verification passes per claim.
pub const MAX_VERIFICATION_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    FirstPass,
    Retried,
}

/// Final grounding result for one claim.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundingOutcome {
    /// Output the decision is built from
    pub output: ModelOutput,
    /// Report for `output`
    pub report: HallucinationReport,
    pub state: RetryState,
    pub verification_attempts: usize,
    /// Present when a retry was made
    pub retry: Option<RetryOutcome>,
}

impl GroundingOutcome {
    pub fn retry_attempted(&self) -> bool {
        self.state == RetryState::Retried
    }
}

/// Drives verification and the single permitted retry.
#[derive(Debug, Clone)]
pub struct RetryController {
    verifier: CitationVerifier,
    options: LlmOptions,
    retry_enabled: bool,
    events: Option<EventLog>,
}

impl RetryController {
    pub fn new(verifier: CitationVerifier, options: LlmOptions) -> Self {
        Self {
            verifier,
            options,
            retry_enabled: true,
            events: None,
        }
    }

    /// Disable the re-prompt; a failed first pass is then final.
    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.retry_enabled = enabled;
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Verify `first_pass` and, if it is ungrounded, re-prompt once.
    #[instrument(skip_all, fields(claim_id = %context.claim_id()))]
    pub async fn ground(
        &self,
        client: &dyn LLMClient,
        context: &ClaimContext,
        document: &PolicyDocument,
        first_pass: ModelOutput,
    ) -> GroundingOutcome {
        let claim_id = context.claim_id();

        let first_report = self.verify(claim_id, &first_pass, document, 1).await;
        if !first_report.hallucination_detected() || !self.retry_enabled {
            return GroundingOutcome {
                output: first_pass,
                report: first_report,
                state: RetryState::FirstPass,
                verification_attempts: 1,
                retry: None,
            };
        }

        let strict = StrictMode::from_report(&first_report);
        info!(
            invalid_sections = ?strict.invalid_sections,
            ungrounded_excerpts = strict.ungrounded_excerpts,
            "Re-prompting with grounding feedback"
        );
        self.record(
            PipelineEvent::new(
                PipelineEventType::RetryStart,
                claim_id,
                "Re-prompting with strict grounding instructions",
            )
            .with_metadata("invalid_sections", strict.invalid_sections.clone()),
        )
        .await;

        let request = PromptBuilder::build(context, Some(&strict)).to_request(&self.options);
        let (retry_output, used_first_pass_output) = match client.complete(request).await {
            Ok(response) => match parse_model_json(&response.content) {
                Ok(map) => (ModelOutput::from_value(Value::Object(map)), false),
                Err(e) => {
                    warn!(error = %e, "Retry response unparsable, keeping first-pass output");
                    (first_pass.clone(), true)
                }
            },
            Err(e) => {
                warn!(error = %e, "Retry call failed, keeping first-pass output");
                self.record(PipelineEvent::error(claim_id, e.to_string())).await;
                (first_pass.clone(), true)
            }
        };

        let mut report = self
            .verify(claim_id, &retry_output, document, MAX_VERIFICATION_ATTEMPTS)
            .await;
        report.mark_retry_failed();
        let retry_failed = report.retry_failed();

        if retry_failed {
            warn!(
                findings = report.finding_count(),
                "Citations still ungrounded after retry, marking unverified"
            );
            self.record(PipelineEvent::new(
                PipelineEventType::RetryExhausted,
                claim_id,
                format!("{} finding(s) remain after retry", report.finding_count()),
            ))
            .await;
        }

        GroundingOutcome {
            output: retry_output.clone(),
            report: report.clone(),
            state: RetryState::Retried,
            verification_attempts: MAX_VERIFICATION_ATTEMPTS,
            retry: Some(RetryOutcome {
                output: retry_output,
                report,
                retry_failed,
                used_first_pass_output,
            }),
        }
    }

    async fn verify(
        &self,
        claim_id: &str,
        output: &ModelOutput,
        document: &PolicyDocument,
        attempt: usize,
    ) -> HallucinationReport {
        self.record(
            PipelineEvent::new(PipelineEventType::VerifyStart, claim_id, "Verifying citations")
                .with_metadata("attempt", attempt),
        )
        .await;

        let report = self.verifier.report(output, document);

        if report.hallucination_detected() {
            warn!(
                attempt,
                failed_sections = report.failed_sections.len(),
                failed_excerpts = report.failed_excerpts.len(),
                "Hallucinated citations detected"
            );
            self.record(PipelineEvent::hallucination_flag(
                claim_id,
                report.failed_sections.len(),
                report.failed_excerpts.len(),
            ))
            .await;
        }

        self.record(
            PipelineEvent::new(
                PipelineEventType::VerifyComplete,
                claim_id,
                format!(
                    "{} clause(s), {} citation(s) checked",
                    report.total_clauses_checked, report.total_citations_checked
                ),
            )
            .with_metadata("attempt", attempt)
            .with_metadata("validation_passed", report.validation_passed()),
        )
        .await;

        report
    }

    async fn record(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            events.record(event).await;
        }
    }
}
