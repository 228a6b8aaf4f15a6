//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::trajectory::DEFAULT_EVENT_RETENTION;

/// Tunables of the citation verifier.
///
/// The defaults reproduce the established matching behavior; changing them
/// changes pass/fail outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Leading characters of a `clause_text` matched against the document
    pub excerpt_prefix_chars: usize,
    /// `clause_text` at or below this many characters is not excerpt-checked
    pub min_clause_text_len: usize,
    /// Characters kept in `excerpt_preview`
    pub preview_chars: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            excerpt_prefix_chars: 60,
            min_clause_text_len: 20,
            preview_chars: 100,
        }
    }
}

/// Sampling options forwarded to the LLM collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmOptions {
    /// Model override; the client default is used when unset
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

/// Configuration for [`ClaimsPipeline`](crate::pipeline::ClaimsPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub llm: LlmOptions,
    /// Issue the single strict re-prompt when the first pass hallucinates
    pub retry_on_hallucination: bool,
    pub verifier: VerifierConfig,
    /// Pipeline events kept in memory; older ones are dropped
    pub event_retention: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm: LlmOptions::default(),
            retry_on_hallucination: true,
            verifier: VerifierConfig::default(),
            event_retention: DEFAULT_EVENT_RETENTION,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `CLAIMGUARD_*` environment variables.
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            llm: LlmOptions {
                model: lookup("CLAIMGUARD_MODEL").filter(|s| !s.is_empty()),
                temperature: lookup("CLAIMGUARD_TEMPERATURE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.llm.temperature),
                max_tokens: lookup("CLAIMGUARD_MAX_TOKENS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.llm.max_tokens),
            },
            retry_on_hallucination: lookup("CLAIMGUARD_RETRY")
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(defaults.retry_on_hallucination),
            verifier: defaults.verifier,
            event_retention: lookup("CLAIMGUARD_EVENT_RETENTION")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_retention),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.llm.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.llm.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.retry_on_hallucination = enabled;
        self
    }

    pub fn with_verifier(mut self, verifier: VerifierConfig) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_event_retention(mut self, max_events: usize) -> Self {
        self.event_retention = max_events;
        self
    }
}
