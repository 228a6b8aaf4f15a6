//! Pipeline event types for observable claim processing.
//!
//! Every claim run emits a stream of [`PipelineEvent`]s: the LLM calls, each
//! verification pass, retry transitions, guardrail overrides and the final
//! decision. Events are kept in memory by an [`EventLog`] and can be
//! streamed live through [`EventLog::subscribe`] or exported afterwards.
//! Shipping them to a telemetry backend is left to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Types of events emitted while processing a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineEventType {
    /// Claim processing started
    PipelineStart,
    /// LLM collaborator invoked
    LlmCall,
    /// Citation verification pass started
    VerifyStart,
    /// Ungrounded citations found
    HallucinationFlag,
    /// Strict re-prompt issued
    RetryStart,
    /// Retry output still ungrounded
    RetryExhausted,
    /// Citation verification pass finished
    VerifyComplete,
    /// Deterministic rule overrode the decision
    GuardrailOverride,
    /// Content guardrail check evaluated
    ContentGuardrail,
    /// Replay hashes attached
    ReplayHashed,
    /// Decision payload emitted
    Final,
    /// Error occurred (and was degraded)
    Error,
}

impl std::fmt::Display for PipelineEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PipelineStart => "PIPELINE_START",
            Self::LlmCall => "LLM_CALL",
            Self::VerifyStart => "VERIFY_START",
            Self::HallucinationFlag => "HALLUCINATION_FLAG",
            Self::RetryStart => "RETRY_START",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::VerifyComplete => "VERIFY_COMPLETE",
            Self::GuardrailOverride => "GUARDRAIL_OVERRIDE",
            Self::ContentGuardrail => "CONTENT_GUARDRAIL",
            Self::ReplayHashed => "REPLAY_HASHED",
            Self::Final => "FINAL",
            Self::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// An event emitted during claim processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Type of the event
    pub event_type: PipelineEventType,
    /// Claim the event belongs to
    pub claim_id: String,
    /// Human-readable content describing the event
    pub content: String,
    /// Event-specific metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    /// Create a new pipeline event.
    pub fn new(
        event_type: PipelineEventType,
        claim_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            claim_id: claim_id.into(),
            content: content.into(),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Add metadata to the event.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get a metadata value.
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref()?.get(key)
    }

    pub fn start(claim_id: &str) -> Self {
        Self::new(PipelineEventType::PipelineStart, claim_id, "Processing claim")
    }

    pub fn llm_call(claim_id: &str, attempt: usize, model: &str) -> Self {
        Self::new(
            PipelineEventType::LlmCall,
            claim_id,
            format!("LLM call {} ({})", attempt, model),
        )
        .with_metadata("attempt", attempt)
        .with_metadata("model", model)
    }

    pub fn hallucination_flag(
        claim_id: &str,
        failed_sections: usize,
        failed_excerpts: usize,
    ) -> Self {
        Self::new(
            PipelineEventType::HallucinationFlag,
            claim_id,
            format!(
                "{} ungrounded section(s), {} ungrounded excerpt(s)",
                failed_sections, failed_excerpts
            ),
        )
        .with_metadata("failed_sections", failed_sections)
        .with_metadata("failed_excerpts", failed_excerpts)
    }

    pub fn guardrail_override(claim_id: &str, reason: impl Into<String>) -> Self {
        Self::new(PipelineEventType::GuardrailOverride, claim_id, reason)
    }

    pub fn error(claim_id: &str, error: impl Into<String>) -> Self {
        Self::new(PipelineEventType::Error, claim_id, error)
    }

    /// Check if this is an error event.
    pub fn is_error(&self) -> bool {
        self.event_type == PipelineEventType::Error
    }

    /// Format as a single-line log entry.
    pub fn as_log_line(&self) -> String {
        format!(
            "[{}] {} {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.claim_id,
            self.event_type,
            self.content.lines().next().unwrap_or("")
        )
    }
}

/// Events kept in memory before the oldest are dropped.
pub const DEFAULT_EVENT_RETENTION: usize = 10_000;

/// Shared, bounded event store with live fan-out.
///
/// Only the most recent `retention` events are kept; subscribers still see
/// every event as it is recorded.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Arc<RwLock<VecDeque<PipelineEvent>>>,
    sender: broadcast::Sender<PipelineEvent>,
    retention: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventLog {
    /// Create a log whose live channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            sender,
            retention: DEFAULT_EVENT_RETENTION,
        }
    }

    /// Keep at most `max_events` events in memory.
    pub fn with_retention(mut self, max_events: usize) -> Self {
        self.retention = max_events.max(1);
        self
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub async fn record(&self, event: PipelineEvent) {
        tracing::debug!(
            claim_id = %event.claim_id,
            event_type = %event.event_type,
            "{}",
            event.content
        );
        // No subscribers is fine.
        let _ = self.sender.send(event.clone());

        let mut events = self.events.write().await;
        while events.len() >= self.retention {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Subscribe to events recorded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub async fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().await.iter().cloned().collect()
    }

    pub async fn events_for(&self, claim_id: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.claim_id == claim_id)
            .cloned()
            .collect()
    }

    pub async fn count_of(&self, event_type: PipelineEventType) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

/// Export format for event logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One JSON object per line
    JsonLines,
    /// Pretty-printed JSON array
    JsonPretty,
}

/// Serialize a list of events to the specified format.
pub fn export_events(events: &[PipelineEvent], format: ExportFormat) -> String {
    match format {
        ExportFormat::JsonLines => events
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n"),
        ExportFormat::JsonPretty => {
            serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".to_string())
        }
    }
}
