//! Interaction session - the sequential, rate-limited automation state
//! machine
//!
//! Walks a frozen snapshot of candidate items strictly in queue order:
//! `idle → running → {paused, stopped} → completed`. Every item passes the
//! rate gate, then the pluggable engage step; only a confirmed commit
//! advances the persisted cursor. A denial pauses the session with a
//! structured reason; a per-item failure is recorded and skipped past.
//! `stop()` takes effect at the next suspension point; an in-flight
//! engage step is allowed to finish so external state is never left
//! ambiguous.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::constants::DEFAULT_ITEM_DELAY_MS;
use crate::domain::pacing::jittered;
use crate::domain::{CompletionReason, EngineEvent, EntityRecord, EventSink};
use crate::error::EngineError;

use super::cursor_store::CursorStore;
use super::engage::EngageStep;
use super::rate_policy::{RatePolicy, can_proceed};

/// Lifecycle state of an interaction session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InteractionStatus {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

/// How one queued item ended up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Disposition {
    /// Irreversible action confirmed; the cursor advanced.
    Committed,
    /// Nothing irreversible happened (not engaged, or opened and
    /// abandoned); the cursor did not advance.
    Skipped,
    /// The engage step (or the commit write) failed.
    Failed,
}

/// Per-item outcome record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub absolute_index: u64,
    pub disposition: Disposition,
    pub detail: Option<String>,
    pub ts: DateTime<Utc>,
}

/// Result of one interaction run, partial or complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionReport {
    pub session_id: String,
    pub target_id: String,
    pub reason: CompletionReason,
    pub committed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub outcomes: Vec<ItemOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Caller-tunable knobs for one interaction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Wait between items, jittered at runtime.
    pub item_delay_ms: u64,
    /// Resume from the persisted cursor instead of offset 0.
    pub continue_from_cursor: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: DEFAULT_ITEM_DELAY_MS,
            continue_from_cursor: false,
        }
    }
}

/// Point-in-time view for `get_status` callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionStatusSnapshot {
    pub status: InteractionStatus,
    pub session_id: Option<String>,
    /// Items processed by this run, regardless of disposition.
    pub processed_in_run: usize,
    pub total_queued: usize,
    pub committed: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Stop,
}

struct Shared {
    status: RwLock<InteractionStatus>,
    control: watch::Sender<Control>,
    session_id: RwLock<Option<String>>,
    report: Mutex<Option<InteractionReport>>,
    processed_in_run: AtomicUsize,
    total_queued: AtomicUsize,
    committed: AtomicU32,
    failed: AtomicU32,
    skipped: AtomicU32,
}

/// The interaction session control surface. The work queue handed to
/// `start` is a frozen snapshot: items discovered later never join a
/// running session.
pub struct InteractionSession {
    cursors: Arc<CursorStore>,
    policy: RatePolicy,
    step: Arc<dyn EngageStep>,
    sink: Arc<dyn EventSink>,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl InteractionSession {
    pub fn new(
        cursors: Arc<CursorStore>,
        policy: RatePolicy,
        step: Arc<dyn EngageStep>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (control, _) = watch::channel(Control::Stop);
        Self {
            cursors,
            policy,
            step,
            sink,
            shared: Arc::new(Shared {
                status: RwLock::new(InteractionStatus::Idle),
                control,
                session_id: RwLock::new(None),
                report: Mutex::new(None),
                processed_in_run: AtomicUsize::new(0),
                total_queued: AtomicUsize::new(0),
                committed: AtomicU32::new(0),
                failed: AtomicU32::new(0),
                skipped: AtomicU32::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Starts a run over `queue` for `target_id`. With
    /// `continue_from_cursor` the starting offset comes from the resume
    /// cursor; the queue must carry the same snapshot ordering as the run
    /// that produced the cursor.
    pub async fn start(
        &self,
        target_id: &str,
        queue: Vec<EntityRecord>,
        config: InteractionConfig,
    ) -> Result<String, EngineError> {
        {
            let mut status = self.shared.status.write().await;
            match *status {
                InteractionStatus::Idle
                | InteractionStatus::Stopped
                | InteractionStatus::Completed => {}
                _ => return Err(EngineError::SessionActive("interaction")),
            }
            *status = InteractionStatus::Running;
        }

        let start_offset = if config.continue_from_cursor {
            match self.cursors.cursor(target_id).await {
                Ok(snapshot) => snapshot.last_index as usize,
                Err(e) => {
                    *self.shared.status.write().await = InteractionStatus::Idle;
                    return Err(e.into());
                }
            }
        } else {
            0
        };

        let session_id = Uuid::new_v4().to_string();
        *self.shared.session_id.write().await = Some(session_id.clone());
        *self.shared.report.lock().await = None;
        self.shared.processed_in_run.store(0, Ordering::SeqCst);
        self.shared.total_queued.store(queue.len(), Ordering::SeqCst);
        self.shared.committed.store(0, Ordering::SeqCst);
        self.shared.failed.store(0, Ordering::SeqCst);
        self.shared.skipped.store(0, Ordering::SeqCst);
        self.shared.control.send_replace(Control::Run);

        info!(
            session_id = %session_id,
            target_id,
            queued = queue.len(),
            start_offset,
            "interaction session started"
        );

        let handle = tokio::spawn(run_loop(RunContext {
            shared: Arc::clone(&self.shared),
            cursors: Arc::clone(&self.cursors),
            policy: self.policy.clone(),
            step: Arc::clone(&self.step),
            sink: Arc::clone(&self.sink),
            queue,
            target_id: target_id.to_string(),
            config,
            session_id: session_id.clone(),
            start_offset,
        }));
        *self.task.lock().await = Some(handle);

        Ok(session_id)
    }

    pub async fn pause(&self) {
        let mut status = self.shared.status.write().await;
        if *status == InteractionStatus::Running {
            *status = InteractionStatus::Paused;
            self.shared.control.send_replace(Control::Pause);
        }
    }

    /// Resumes a paused session, including one paused by a rate denial.
    pub async fn resume(&self) {
        let mut status = self.shared.status.write().await;
        if *status == InteractionStatus::Paused {
            *status = InteractionStatus::Running;
            self.shared.control.send_replace(Control::Run);
        }
    }

    /// Stops at the next suspension point and returns the partial report.
    /// `None` when no run ever started.
    pub async fn stop(&self) -> Option<InteractionReport> {
        {
            let mut status = self.shared.status.write().await;
            if matches!(
                *status,
                InteractionStatus::Running | InteractionStatus::Paused
            ) {
                *status = InteractionStatus::Stopped;
            }
        }
        self.shared.control.send_replace(Control::Stop);
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("interaction task ended abnormally: {e}");
            }
        }
        self.shared.report.lock().await.clone()
    }

    /// Report of the last finished run, if any.
    pub async fn take_report(&self) -> Option<InteractionReport> {
        self.shared.report.lock().await.take()
    }

    pub async fn status(&self) -> InteractionStatusSnapshot {
        InteractionStatusSnapshot {
            status: *self.shared.status.read().await,
            session_id: self.shared.session_id.read().await.clone(),
            processed_in_run: self.shared.processed_in_run.load(Ordering::SeqCst),
            total_queued: self.shared.total_queued.load(Ordering::SeqCst),
            committed: self.shared.committed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
            skipped: self.shared.skipped.load(Ordering::SeqCst),
        }
    }
}

struct RunContext {
    shared: Arc<Shared>,
    cursors: Arc<CursorStore>,
    policy: RatePolicy,
    step: Arc<dyn EngageStep>,
    sink: Arc<dyn EventSink>,
    queue: Vec<EntityRecord>,
    target_id: String,
    config: InteractionConfig,
    session_id: String,
    start_offset: usize,
}

async fn run_loop(ctx: RunContext) {
    let RunContext {
        shared,
        cursors,
        policy,
        step,
        sink,
        queue,
        target_id,
        config,
        session_id,
        start_offset,
    } = ctx;

    let mut control_rx = shared.control.subscribe();
    let started_at = Utc::now();
    let total = queue.len();
    let mut outcomes: Vec<ItemOutcome> = Vec::new();
    let mut idx = start_offset;

    let reason = 'run: loop {
        if idx >= total {
            break CompletionReason::QueueExhausted;
        }

        // Honor the control surface before each item.
        loop {
            let desired = *control_rx.borrow();
            match desired {
                Control::Stop => break 'run CompletionReason::Stopped,
                Control::Pause => {
                    debug!(session_id = %session_id, "interaction paused");
                    if control_rx.changed().await.is_err() {
                        break 'run CompletionReason::Stopped;
                    }
                }
                Control::Run => {
                    *shared.status.write().await = InteractionStatus::Running;
                    break;
                }
            }
        }

        let item = &queue[idx];
        let now = Utc::now();

        // Rate gate. A denial is not an error: pause and wait for the
        // caller to resume or stop.
        let counters = match cursors.counters(now).await {
            Ok(counters) => counters,
            Err(e) => {
                warn!(session_id = %session_id, "rate counter read failed: {e}");
                sink.emit(EngineEvent::SessionError {
                    session_id: session_id.clone(),
                    message: format!("rate counter read failed: {e}"),
                });
                *shared.status.write().await = InteractionStatus::Paused;
                if control_rx.changed().await.is_err() {
                    break 'run CompletionReason::Stopped;
                }
                continue;
            }
        };
        if let Err(deny) = can_proceed(&counters, &policy, now) {
            info!(session_id = %session_id, reason = %deny, "rate gate denied; pausing");
            *shared.status.write().await = InteractionStatus::Paused;
            sink.emit(EngineEvent::RateLimited {
                session_id: session_id.clone(),
                reason: deny,
                message: deny.to_string(),
                occurred_at: now,
            });
            if control_rx.changed().await.is_err() {
                break 'run CompletionReason::Stopped;
            }
            // Re-check the same item after the caller acted.
            continue;
        }

        // Engage. The step runs to its terminal signal even if a stop
        // arrives meanwhile; a per-item failure never aborts the session.
        let outcome = match step.engage(item).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(session_id = %session_id, item_id = %item.id, "engage step failed: {e}");
                sink.emit(EngineEvent::ItemFailed {
                    session_id: session_id.clone(),
                    item_id: item.id.clone(),
                    message: e.to_string(),
                });
                None
            }
        };

        let disposition = match outcome {
            Some(outcome) if outcome.committed => {
                match cursors
                    .record_success(&target_id, &item.id, idx as u64, outcome.summary.clone())
                    .await
                {
                    Ok(()) => {
                        if let Err(e) = cursors.record_action(now).await {
                            warn!(session_id = %session_id, "rate counter write failed: {e}");
                        }
                        (Disposition::Committed, outcome.summary)
                    }
                    Err(e) => {
                        // The action happened but the cursor write did not;
                        // surface it so the caller can reconcile.
                        sink.emit(EngineEvent::SessionError {
                            session_id: session_id.clone(),
                            message: format!("cursor write failed for {}: {e}", item.id),
                        });
                        (Disposition::Failed, Some(format!("cursor write failed: {e}")))
                    }
                }
            }
            Some(outcome) => {
                let note = if outcome.engaged {
                    "opened and abandoned"
                } else {
                    "not engaged"
                };
                (Disposition::Skipped, Some(note.to_string()))
            }
            None => (Disposition::Failed, None),
        };

        let (disposition, detail) = disposition;
        let committed_now = disposition == Disposition::Committed;
        match disposition {
            Disposition::Committed => shared.committed.fetch_add(1, Ordering::SeqCst),
            Disposition::Skipped => shared.skipped.fetch_add(1, Ordering::SeqCst),
            Disposition::Failed => shared.failed.fetch_add(1, Ordering::SeqCst),
        };
        outcomes.push(ItemOutcome {
            item_id: item.id.clone(),
            absolute_index: idx as u64,
            disposition,
            detail,
            ts: Utc::now(),
        });

        let current_offset = idx - start_offset;
        shared
            .processed_in_run
            .store(current_offset + 1, Ordering::SeqCst);
        sink.emit(EngineEvent::InteractionProgress {
            session_id: session_id.clone(),
            current_offset,
            total_queued: total,
            absolute_index: idx as u64,
            committed: committed_now,
        });

        idx += 1;

        // Suspension point between items.
        if idx < total {
            tokio::select! {
                _ = sleep(jittered(config.item_delay_ms)) => {}
                _ = control_rx.changed() => {}
            }
        }
    };

    let finished_at = Utc::now();
    let report = InteractionReport {
        session_id: session_id.clone(),
        target_id,
        reason,
        committed: shared.committed.load(Ordering::SeqCst),
        failed: shared.failed.load(Ordering::SeqCst),
        skipped: shared.skipped.load(Ordering::SeqCst),
        outcomes,
        started_at,
        finished_at,
    };
    info!(
        session_id = %session_id,
        ?reason,
        committed = report.committed,
        failed = report.failed,
        skipped = report.skipped,
        "interaction session finished"
    );
    let (committed, failed, skipped) = (report.committed, report.failed, report.skipped);
    // The report must be readable before the completion event lands.
    *shared.report.lock().await = Some(report);
    *shared.status.write().await = InteractionStatus::Completed;
    sink.emit(EngineEvent::InteractionCompleted {
        session_id,
        reason,
        committed,
        failed,
        skipped,
    });
}
