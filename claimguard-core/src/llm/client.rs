//! LLM client trait and the OpenAI-compatible provider implementation.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

use super::types::{
    ChatRole, CompletionRequest, CompletionResponse, CostTracker, ModelSpec, Provider, StopReason,
    TokenUsage,
};

/// LLM client trait for making completions.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete a prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider for this client.
    fn provider(&self) -> Provider;

    /// List available models.
    fn available_models(&self) -> Vec<ModelSpec>;
}

/// Configuration for LLM clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub const OPENROUTER_BASE_URL: &'static str = "https://openrouter.ai/api";
    pub const OPENROUTER_DEFAULT_MODEL: &'static str = "openai/gpt-4o-mini";
    const PLACEHOLDER_KEY: &'static str = "your_openrouter_api_key_here";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: None,
            timeout_secs: 120,
        }
    }

    /// OpenRouter configuration from `OPENROUTER_API_KEY` / `OPENROUTER_MODEL`.
    ///
    /// Returns `None` when no usable key is set, so callers can fall back to
    /// the simulated client.
    pub fn openrouter_from_env() -> Option<Self> {
        Self::openrouter_from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn openrouter_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = lookup("OPENROUTER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != Self::PLACEHOLDER_KEY)?;
        let model = lookup("OPENROUTER_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| Self::OPENROUTER_DEFAULT_MODEL.to_string());

        Some(
            Self::new(api_key)
                .with_base_url(Self::OPENROUTER_BASE_URL)
                .with_default_model(model),
        )
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    // Proxy auto-detection can fail in sandboxed environments; retry without it.
    Client::builder()
        .timeout(timeout)
        .build()
        .or_else(|_| Client::builder().no_proxy().timeout(timeout).build())
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Client for any OpenAI-compatible chat-completions endpoint.
///
/// Talks to OpenRouter when built from [`ClientConfig::openrouter_from_env`].
pub struct OpenAIClient {
    config: ClientConfig,
    http: Client,
}

impl OpenAIClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;

        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    fn is_openrouter(&self) -> bool {
        self.base_url().contains("openrouter.ai")
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let provider = self.provider().to_string();
        let model = request
            .model
            .or(self.config.default_model.clone())
            .unwrap_or_else(|| ClientConfig::OPENROUTER_DEFAULT_MODEL.to_string());

        let mut messages: Vec<OpenAIMessage> = Vec::new();

        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: ChatRole::System.as_str().to_string(),
                content: Some(system.clone()),
            });
        }

        for m in &request.messages {
            messages.push(OpenAIMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            });
        }

        let api_request = OpenAIRequest {
            model: model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let url = format!("{}/v1/chat/completions", self.base_url());

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::llm_api(&provider, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::llm_api(&provider, format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OpenAIError>(&body) {
                return Err(Error::llm_api(&provider, error.error.message));
            }
            return Err(Error::llm_api(&provider, format!("({}) {}", status, body)));
        }

        let api_response: OpenAIResponse = serde_json::from_str(&body)
            .map_err(|e| Error::llm_api(&provider, format!("Failed to parse response: {}", e)))?;

        let choice = api_response
            .choices
            .first()
            .ok_or_else(|| Error::llm_api(&provider, "No choices in response"))?;

        let stop_reason = choice.finish_reason.as_deref().map(|r| match r {
            "length" => StopReason::MaxTokens,
            "content_filter" => StopReason::ContentFilter,
            _ => StopReason::EndTurn,
        });

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let cost = self
            .available_models()
            .into_iter()
            .find(|m| m.matches(&model))
            .map(|spec| spec.calculate_cost(usage.input_tokens, usage.output_tokens));

        Ok(CompletionResponse {
            id: api_response.id,
            model: if api_response.model.is_empty() {
                model
            } else {
                api_response.model
            },
            content: choice.message.content.clone().unwrap_or_default(),
            stop_reason,
            usage,
            timestamp: Utc::now(),
            cost,
        })
    }

    fn provider(&self) -> Provider {
        if self.is_openrouter() {
            Provider::OpenRouter
        } else {
            Provider::OpenAI
        }
    }

    fn available_models(&self) -> Vec<ModelSpec> {
        vec![ModelSpec::gpt4o_mini(), ModelSpec::gpt4o()]
    }
}

/// Client wrapper that records token usage and cost of every call.
#[derive(Clone)]
pub struct TrackedClient {
    inner: Arc<dyn LLMClient>,
    costs: Arc<RwLock<CostTracker>>,
}

impl TrackedClient {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            inner: client,
            costs: Arc::new(RwLock::new(CostTracker::new())),
        }
    }

    /// Get current cost summary.
    pub async fn get_costs(&self) -> CostTracker {
        self.costs.read().await.clone()
    }

    /// Reset cost tracking.
    pub async fn reset_costs(&self) {
        let mut costs = self.costs.write().await;
        *costs = CostTracker::new();
    }
}

#[async_trait]
impl LLMClient for TrackedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = self.inner.complete(request).await?;

        let mut costs = self.costs.write().await;
        costs.record(&response.model, &response.usage, response.cost);

        Ok(response)
    }

    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    fn available_models(&self) -> Vec<ModelSpec> {
        self.inner.available_models()
    }
}
