//! # claimguard-core
//!
//! Clause-grounding verification and deterministic guardrails for
//! LLM-assisted insurance claim decisions.
//!
//! ## Core Components
//!
//! - **Grounding**: Policy section extraction, citation verification,
//!   hallucination reports and the bounded grounding retry
//! - **Guardrails**: Content checks and the deterministic override chain
//! - **Replay**: SHA-256 hashes of the policy text and retrieved context
//! - **Pipeline**: End-to-end claim processing into a [`DecisionPayload`]
//! - **Trajectory**: Observable pipeline events for streaming and audit
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimguard_core::{ClaimsPipeline, ClaimContext};
//!
//! let pipeline = ClaimsPipeline::from_env("policies/homeowners.txt").await?;
//! let payload = pipeline.process(&context).await;
//! if !payload.validation_passed {
//!     println!("Ungrounded clauses: {:?}", payload.clause_verification.failed_sections);
//! }
//! ```

pub mod claim;
pub mod config;
pub mod coverage;
pub mod decision;
pub mod error;
pub mod grounding;
pub mod guardrails;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod replay;
pub mod trajectory;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use claim::{ClaimContext, ClaimInput, ToolResults};
pub use config::{LlmOptions, PipelineConfig, VerifierConfig};
pub use coverage::{ClauseAttribution, CoverageResult};
pub use decision::{DecisionPayload, DecisionRecord, DecisionType};
pub use error::{Error, Result};
pub use grounding::{
    extract_sections, verify_llm_clauses, verify_model_output, CitationVerifier,
    HallucinationReport, ModelOutput, PolicyCache, PolicyDocument, RetryController,
};
pub use guardrails::{apply_deterministic_guardrails, GuardrailResult, Override, OverrideRule};
pub use llm::{
    ClientConfig, CompletionRequest, CompletionResponse, CostTracker, LLMClient, ModelSpec,
    OpenAIClient, Provider, SimulatedClient, TrackedClient,
};
pub use pipeline::ClaimsPipeline;
pub use replay::{compute_policy_hash, compute_text_hash, ReplayHashes};
pub use trajectory::{EventLog, ExportFormat, PipelineEvent, PipelineEventType};
