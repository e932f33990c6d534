//! Collection session - the scroll-and-extract state machine
//!
//! Composes the growth driver, the extraction pipeline, and the
//! accumulator into one cooperative, single-flow loop:
//! `idle → running → {paused, stopping} → completed`. Each tick re-scans
//! the render tree (on a timer or on a structural-mutation notification),
//! admits candidates, triggers one unit of page growth, and reports
//! progress. Partial results are valid results: `stop()` returns whatever
//! was accumulated.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use scraper::Html;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::constants::{
    DEFAULT_NO_GROWTH_LIMIT, DEFAULT_REDIRECT_PROBE_STEPS, DEFAULT_STEP_DELAY_MS,
    DEFAULT_STEP_LIMIT,
};
use crate::domain::pacing::jittered;
use crate::domain::{
    CompletionReason, EngineEvent, EntityRecord, EventSink, FilterCriteria,
};
use crate::error::EngineError;
use crate::extraction::ExtractionPipeline;
use crate::infrastructure::{GrowthTrigger, PageView};

use super::accumulator::Accumulator;

/// Lifecycle state of a collection session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CollectionStatus {
    Idle,
    Running,
    Paused,
    Stopping,
    Completed,
}

/// Caller-tunable knobs for one collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Upper bound on growth steps.
    pub step_limit: u32,
    /// Cadence between steps, jittered at runtime.
    pub step_delay_ms: u64,
    /// Consecutive fruitless steps before graceful no-growth completion.
    pub no_growth_limit: u32,
    /// Steps with zero records before `RedirectSuggested` fires.
    pub redirect_probe_steps: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
            no_growth_limit: DEFAULT_NO_GROWTH_LIMIT,
            redirect_probe_steps: DEFAULT_REDIRECT_PROBE_STEPS,
        }
    }
}

/// Point-in-time view of the session for `get_status` callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStatusSnapshot {
    pub status: CollectionStatus,
    pub session_id: Option<String>,
    pub steps_taken: u32,
    pub step_limit: u32,
    pub record_count: usize,
    pub last_message: String,
}

/// Desired state, written by the control surface and observed by the loop
/// at its suspension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Stop,
}

struct Shared {
    status: RwLock<CollectionStatus>,
    control: watch::Sender<Control>,
    accumulator: Mutex<Accumulator>,
    steps: AtomicU32,
    step_limit: AtomicU32,
    session_id: RwLock<Option<String>>,
    last_message: RwLock<String>,
}

/// The collection session control surface. All collaborators are injected
/// at construction; `start` spawns the cooperative loop.
pub struct CollectionSession {
    page: Arc<dyn PageView>,
    growth: Arc<dyn GrowthTrigger>,
    pipeline: Arc<ExtractionPipeline>,
    sink: Arc<dyn EventSink>,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CollectionSession {
    pub fn new(
        page: Arc<dyn PageView>,
        growth: Arc<dyn GrowthTrigger>,
        pipeline: Arc<ExtractionPipeline>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (control, _) = watch::channel(Control::Stop);
        Self {
            page,
            growth,
            pipeline,
            sink,
            shared: Arc::new(Shared {
                status: RwLock::new(CollectionStatus::Idle),
                control,
                accumulator: Mutex::new(Accumulator::new()),
                steps: AtomicU32::new(0),
                step_limit: AtomicU32::new(0),
                session_id: RwLock::new(None),
                last_message: RwLock::new(String::new()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Starts a new run. Rejected while a run is active; accumulated state
    /// from a previous completed run is discarded.
    pub async fn start(
        &self,
        criteria: FilterCriteria,
        config: CollectionConfig,
    ) -> Result<String, EngineError> {
        criteria.validate()?;

        {
            let mut status = self.shared.status.write().await;
            match *status {
                CollectionStatus::Idle | CollectionStatus::Completed => {}
                _ => return Err(EngineError::SessionActive("collection")),
            }
            *status = CollectionStatus::Running;
        }

        let session_id = Uuid::new_v4().to_string();
        self.shared.accumulator.lock().await.clear();
        self.shared.steps.store(0, Ordering::SeqCst);
        self.shared
            .step_limit
            .store(config.step_limit, Ordering::SeqCst);
        *self.shared.session_id.write().await = Some(session_id.clone());
        *self.shared.last_message.write().await = "collection started".to_string();
        self.shared.control.send_replace(Control::Run);

        info!(session_id = %session_id, step_limit = config.step_limit, "collection session started");

        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.page),
            Arc::clone(&self.growth),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.sink),
            criteria,
            config,
            session_id.clone(),
        ));
        *self.task.lock().await = Some(handle);

        Ok(session_id)
    }

    /// Freezes the step timer and the mutation observer. Accumulated
    /// records are kept.
    pub async fn pause(&self) {
        let mut status = self.shared.status.write().await;
        if *status == CollectionStatus::Running {
            *status = CollectionStatus::Paused;
            self.shared.control.send_replace(Control::Pause);
        }
    }

    pub async fn resume(&self) {
        let mut status = self.shared.status.write().await;
        if *status == CollectionStatus::Paused {
            *status = CollectionStatus::Running;
            self.shared.control.send_replace(Control::Run);
        }
    }

    /// Explicit stop: takes effect at the next suspension point and
    /// returns everything accumulated so far.
    pub async fn stop(&self) -> Vec<EntityRecord> {
        {
            let mut status = self.shared.status.write().await;
            if matches!(
                *status,
                CollectionStatus::Running | CollectionStatus::Paused
            ) {
                *status = CollectionStatus::Stopping;
            }
        }
        self.shared.control.send_replace(Control::Stop);
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("collection task ended abnormally: {e}");
            }
        }
        self.take_results().await
    }

    /// Drains the results of a completed (or stopped) run.
    pub async fn take_results(&self) -> Vec<EntityRecord> {
        self.shared.accumulator.lock().await.take_records()
    }

    pub async fn status(&self) -> CollectionStatusSnapshot {
        CollectionStatusSnapshot {
            status: *self.shared.status.read().await,
            session_id: self.shared.session_id.read().await.clone(),
            steps_taken: self.shared.steps.load(Ordering::SeqCst),
            step_limit: self.shared.step_limit.load(Ordering::SeqCst),
            record_count: self.shared.accumulator.lock().await.len(),
            last_message: self.shared.last_message.read().await.clone(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    shared: Arc<Shared>,
    page: Arc<dyn PageView>,
    growth: Arc<dyn GrowthTrigger>,
    pipeline: Arc<ExtractionPipeline>,
    sink: Arc<dyn EventSink>,
    criteria: FilterCriteria,
    config: CollectionConfig,
    session_id: String,
) {
    let mut control_rx = shared.control.subscribe();
    let mut changes = page.subscribe_changes();
    changes.borrow_and_update();
    let mut reactive = true;

    let mut fruitless = 0u32;
    let mut total_candidates = 0usize;
    let mut redirect_emitted = false;

    let reason = 'run: loop {
        // Honor the control surface before each tick.
        loop {
            let desired = *control_rx.borrow();
            match desired {
                Control::Stop => break 'run CompletionReason::Stopped,
                Control::Pause => {
                    debug!(session_id = %session_id, "collection paused");
                    if control_rx.changed().await.is_err() {
                        break 'run CompletionReason::Stopped;
                    }
                }
                Control::Run => break,
            }
        }

        // Suspension point: cadence timer, reactive re-scan, or control.
        let step_started = Instant::now();
        tokio::select! {
            _ = sleep(jittered(config.step_delay_ms)) => {}
            changed = changes.changed(), if reactive => {
                if changed.is_err() {
                    debug!("render change feed closed; timer-only stepping");
                    reactive = false;
                    continue;
                }
            }
            _ = control_rx.changed() => continue,
        }

        // Scan and admit.
        let (candidates_seen, admitted) = match page.snapshot().await {
            Ok(snapshot) => {
                let candidates = {
                    let html = Html::parse_document(&snapshot);
                    pipeline.extract(&html)
                };
                let seen = candidates.len();
                let mut acc = shared.accumulator.lock().await;
                let mut fresh = 0usize;
                for record in candidates {
                    if acc.admit(record.clone(), &criteria) {
                        fresh += 1;
                        sink.emit(EngineEvent::NewItem {
                            session_id: session_id.clone(),
                            record,
                        });
                    }
                }
                (seen, fresh)
            }
            Err(e) => {
                warn!(session_id = %session_id, "render snapshot failed: {e}");
                (0, 0)
            }
        };
        total_candidates += candidates_seen;

        let steps = shared.steps.fetch_add(1, Ordering::SeqCst) + 1;
        let record_count = shared.accumulator.lock().await.len();
        sink.emit(EngineEvent::CollectionProgress {
            session_id: session_id.clone(),
            steps_taken: steps,
            step_limit: config.step_limit,
            candidates_seen,
            record_count,
        });
        // Elapsed time is observability only; it does not feed back into
        // the cadence.
        debug!(
            session_id = %session_id,
            steps,
            candidates_seen,
            admitted,
            elapsed_ms = step_started.elapsed().as_millis() as u64,
            "collection step finished"
        );

        if admitted == 0 {
            fruitless += 1;
        } else {
            fruitless = 0;
        }

        // Only a detection failure suggests the wrong view. Candidates that
        // were all rejected by the filter criteria mean detection works and
        // the criteria are strict; no redirect then.
        if total_candidates == 0 && steps >= config.redirect_probe_steps && !redirect_emitted {
            redirect_emitted = true;
            let message =
                "no candidates detected after repeated scans; the current view may not list target entities"
                    .to_string();
            *shared.last_message.write().await = message.clone();
            sink.emit(EngineEvent::RedirectSuggested {
                session_id: session_id.clone(),
                steps_taken: steps,
                message,
            });
        }

        if fruitless >= config.no_growth_limit {
            break CompletionReason::NoGrowthDetected;
        }
        if steps >= config.step_limit {
            break CompletionReason::StepLimitReached;
        }

        if let Err(e) = growth.grow().await {
            warn!(session_id = %session_id, "growth trigger failed: {e}");
        }
    };

    let steps_taken = shared.steps.load(Ordering::SeqCst);
    let record_count = shared.accumulator.lock().await.len();
    *shared.status.write().await = CollectionStatus::Completed;
    *shared.last_message.write().await = format!("completed: {reason:?}");
    info!(
        session_id = %session_id,
        ?reason,
        steps_taken,
        record_count,
        "collection session completed"
    );
    sink.emit(EngineEvent::CollectionCompleted {
        session_id,
        reason,
        steps_taken,
        record_count,
    });
}
