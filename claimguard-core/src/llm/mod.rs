//! LLM collaborator abstraction.
//!
//! The pipeline talks to models only through [`LLMClient`]. Two
//! implementations ship with the crate: [`OpenAIClient`] for any
//! OpenAI-compatible chat-completions endpoint (OpenRouter by default) and
//! [`SimulatedClient`], a deterministic offline responder.
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimguard_core::llm::{default_client, ChatMessage, CompletionRequest};
//!
//! let client = default_client()?;
//! let request = CompletionRequest::new()
//!     .with_system("You are a claims analyst")
//!     .with_message(ChatMessage::user("Analyze claim CLM-001"));
//!
//! let response = client.complete(request).await?;
//! ```

mod client;
mod simulated;
mod types;

use std::sync::Arc;

pub use client::{ClientConfig, LLMClient, OpenAIClient, TrackedClient};
pub use simulated::SimulatedClient;
pub use types::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, CostTracker, ModelCosts,
    ModelSpec, Provider, StopReason, TokenUsage,
};

/// OpenRouter client when `OPENROUTER_API_KEY` is set, otherwise the
/// simulated client.
pub fn default_client() -> crate::error::Result<Arc<dyn LLMClient>> {
    match ClientConfig::openrouter_from_env() {
        Some(config) => {
            tracing::info!(model = ?config.default_model, "Using OpenRouter client");
            Ok(Arc::new(OpenAIClient::new(config)?))
        }
        None => {
            tracing::info!("No OpenRouter key configured, using simulated client");
            Ok(Arc::new(SimulatedClient::new()))
        }
    }
}
