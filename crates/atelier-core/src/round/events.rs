//! Structured round progress events.
//!
//! Every progress line the controller logs is also published as a
//! [`RoundEvent`] on an optional channel, so a caller can stream the round as
//! NDJSON while it runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::domain::Phase;

/// Kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    System,
    Thought,
    ToolStart,
    ToolResult,
    ToolError,
    PhaseStart,
    PhaseResult,
}

/// One line of round progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEvent {
    pub run_id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Optional fields of an event.
#[derive(Debug, Clone, Default)]
pub struct EventDetail {
    pub tool: Option<String>,
    pub duration_ms: Option<u64>,
    pub context: Option<serde_json::Value>,
}

impl EventDetail {
    pub fn tool(tool: impl Into<String>) -> Self {
        Self {
            tool: Some(tool.into()),
            ..Self::default()
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Debug)]
struct EmitterInner {
    run_id: String,
    seq: AtomicU64,
    sink: Option<UnboundedSender<RoundEvent>>,
}

/// Publishes numbered events for one round. Cheap to clone; clones share
/// the sequence counter.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl EventEmitter {
    pub fn new(run_id: impl Into<String>, sink: Option<UnboundedSender<RoundEvent>>) -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                run_id: run_id.into(),
                seq: AtomicU64::new(0),
                sink,
            }),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    /// Events published so far.
    pub fn published(&self) -> u64 {
        self.inner.seq.load(Ordering::SeqCst)
    }

    pub fn publish(&self, phase: Phase, kind: EventKind, message: impl Into<String>) -> RoundEvent {
        self.publish_with(phase, kind, message, EventDetail::default())
    }

    pub fn publish_with(
        &self,
        phase: Phase,
        kind: EventKind,
        message: impl Into<String>,
        detail: EventDetail,
    ) -> RoundEvent {
        let event = RoundEvent {
            run_id: self.inner.run_id.clone(),
            seq: self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1,
            timestamp: Utc::now(),
            phase,
            kind,
            message: message.into(),
            tool: detail.tool,
            duration_ms: detail.duration_ms,
            context: detail.context,
        };

        if let Some(sink) = &self.inner.sink {
            if sink.send(event.clone()).is_err() {
                debug!(run_id = %self.inner.run_id, seq = event.seq, "event receiver dropped");
            }
        }
        event
    }
}
