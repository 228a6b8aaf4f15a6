//! Error types for claimguard-core.

use thiserror::Error;

/// Result type alias using claimguard-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing a claim.
///
/// Verification failures are not errors: they are reported through
/// [`HallucinationReport`](crate::grounding::HallucinationReport). Only
/// collaborator and I/O failures surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// LLM API error
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: String, message: String },

    /// LLM error (simple variant)
    #[error("LLM error: {0}")]
    LLM(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Policy document could not be loaded
    #[error("Failed to load policy document {path}: {message}")]
    PolicyLoad { path: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an LLM API error.
    pub fn llm_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a policy load error.
    pub fn policy_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PolicyLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the LLM collaborator.
    pub fn is_llm(&self) -> bool {
        matches!(self, Self::LlmApi { .. } | Self::LLM(_))
    }
}
