//! Event types emitted by the engine to its progress sink
//!
//! Tagged, serializable events so a host application can forward them over
//! whatever channel it uses (IPC, websocket, log). Collection and
//! interaction sessions share one event stream, distinguished by tag and
//! `session_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::entities::EntityRecord;

/// Why a session reached `completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionReason {
    /// The configured step limit was exhausted.
    StepLimitReached,
    /// Repeated growth triggers produced no new records.
    NoGrowthDetected,
    /// Explicit caller stop; partial results are valid results.
    Stopped,
    /// The interaction work queue was fully traversed.
    QueueExhausted,
}

/// First failing rate gate, in evaluation order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DenyReason {
    OutsideActiveHours,
    HourlyCapReached,
    DailyCapReached,
    CoolingDown,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::OutsideActiveHours => write!(f, "outside the active-hours window"),
            DenyReason::HourlyCapReached => write!(f, "hourly cap reached"),
            DenyReason::DailyCapReached => write!(f, "daily cap reached"),
            DenyReason::CoolingDown => write!(f, "cooling down since the last action"),
        }
    }
}

/// Events emitted to the caller-supplied progress sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    /// One collection step finished. `candidates_seen` counts what the
    /// probes extracted this step, before dedupe and filters, so a caller
    /// can tell strict criteria apart from failed detection.
    CollectionProgress {
        session_id: String,
        steps_taken: u32,
        step_limit: u32,
        candidates_seen: usize,
        record_count: usize,
    },
    /// A record passed dedupe and filters and was stored.
    NewItem {
        session_id: String,
        record: EntityRecord,
    },
    /// Zero records after the probe threshold: the session is likely
    /// scanning the wrong view. The caller owns any navigation.
    RedirectSuggested {
        session_id: String,
        steps_taken: u32,
        message: String,
    },
    /// The collection session reached `completed`.
    CollectionCompleted {
        session_id: String,
        reason: CompletionReason,
        steps_taken: u32,
        record_count: usize,
    },
    /// One queued item was processed (engaged, skipped, or failed).
    InteractionProgress {
        session_id: String,
        current_offset: usize,
        total_queued: usize,
        absolute_index: u64,
        committed: bool,
    },
    /// The rate gate denied the next action; the session paused itself.
    /// Not an error: the caller decides whether to wait, resume, or stop.
    RateLimited {
        session_id: String,
        reason: DenyReason,
        message: String,
        occurred_at: DateTime<Utc>,
    },
    /// One item's engage step failed; the session continues.
    ItemFailed {
        session_id: String,
        item_id: String,
        message: String,
    },
    /// A session-level failure (e.g. persistence) that did not destroy
    /// in-memory state. The caller may retry or stop.
    SessionError {
        session_id: String,
        message: String,
    },
    /// The interaction session reached a terminal state.
    InteractionCompleted {
        session_id: String,
        reason: CompletionReason,
        committed: u32,
        failed: u32,
        skipped: u32,
    },
}

impl EngineEvent {
    /// Stable event name for hosts that route by string tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            EngineEvent::CollectionProgress { .. } => "collection-progress",
            EngineEvent::NewItem { .. } => "new-item",
            EngineEvent::RedirectSuggested { .. } => "redirect-suggested",
            EngineEvent::CollectionCompleted { .. } => "collection-completed",
            EngineEvent::InteractionProgress { .. } => "interaction-progress",
            EngineEvent::RateLimited { .. } => "rate-limited",
            EngineEvent::ItemFailed { .. } => "item-failed",
            EngineEvent::SessionError { .. } => "session-error",
            EngineEvent::InteractionCompleted { .. } => "interaction-completed",
        }
    }
}

/// Progress sink injected into sessions at construction time.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink forwarding events into an unbounded channel. A closed receiver is
/// tolerated: sessions keep running even if nobody is listening anymore.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// Convenience pair constructor.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped; event discarded");
        }
    }
}

/// Sink that drops everything. Useful for callers that only poll status.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}
