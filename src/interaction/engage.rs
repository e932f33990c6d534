//! The pluggable engage step and its decorator chain
//!
//! An engage step performs one externally-timed action on one item (open a
//! composer, send a message) and resolves exactly once with a terminal
//! outcome. Expected negative outcomes are values, not errors. Cross-
//! cutting behavior (authorization, instrumentation) layers on via
//! construction-time wrappers, never runtime patching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::EntityRecord;
use crate::error::EngageError;

/// Terminal outcome of one engage attempt.
///
/// `committed` means an irreversible action was confirmed (e.g. a message
/// was sent); `engaged` without `committed` means the item was opened and
/// abandoned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngageOutcome {
    pub engaged: bool,
    pub committed: bool,
    /// Short free-form note persisted into the processed log.
    pub summary: Option<String>,
}

impl EngageOutcome {
    pub fn committed(summary: impl Into<String>) -> Self {
        Self {
            engaged: true,
            committed: true,
            summary: Some(summary.into()),
        }
    }

    pub fn abandoned() -> Self {
        Self {
            engaged: true,
            committed: false,
            summary: None,
        }
    }

    pub fn skipped() -> Self {
        Self::default()
    }
}

/// One externally-timed action on one item. Must resolve exactly once;
/// `Err` is reserved for truly exceptional conditions.
#[async_trait]
pub trait EngageStep: Send + Sync {
    async fn engage(&self, item: &EntityRecord) -> Result<EngageOutcome, EngageError>;
}

/// Adapter turning a plain closure into a step. Handy for tests and for
/// hosts whose action is synchronous.
pub struct FnStep<F>(pub F);

#[async_trait]
impl<F> EngageStep for FnStep<F>
where
    F: Fn(&EntityRecord) -> Result<EngageOutcome, EngageError> + Send + Sync,
{
    async fn engage(&self, item: &EntityRecord) -> Result<EngageOutcome, EngageError> {
        (self.0)(item)
    }
}

/// Authorization check consulted before each engage attempt.
pub trait AccessGuard: Send + Sync {
    fn allowed(&self) -> bool;
}

/// Denies the inner step when the guard says no. Composed at construction:
/// `GatedStep::new(inner, guard)`.
pub struct GatedStep<S> {
    inner: S,
    guard: std::sync::Arc<dyn AccessGuard>,
}

impl<S> GatedStep<S> {
    pub fn new(inner: S, guard: std::sync::Arc<dyn AccessGuard>) -> Self {
        Self { inner, guard }
    }
}

#[async_trait]
impl<S: EngageStep> EngageStep for GatedStep<S> {
    async fn engage(&self, item: &EntityRecord) -> Result<EngageOutcome, EngageError> {
        if !self.guard.allowed() {
            return Err(EngageError::Failed("access guard denied the action".into()));
        }
        self.inner.engage(item).await
    }
}

/// Wraps the inner step in a span and logs the terminal outcome.
pub struct InstrumentedStep<S> {
    inner: S,
}

impl<S> InstrumentedStep<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: EngageStep> EngageStep for InstrumentedStep<S> {
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn engage(&self, item: &EntityRecord) -> Result<EngageOutcome, EngageError> {
        let started = std::time::Instant::now();
        let result = self.inner.engage(item).await;
        match &result {
            Ok(outcome) => debug!(
                committed = outcome.committed,
                engaged = outcome.engaged,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "engage step resolved"
            ),
            Err(e) => debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "engage step failed: {e}"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivitySignals, EntityCategory};
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn item() -> EntityRecord {
        EntityRecord {
            id: "g1".into(),
            display_name: "Group".into(),
            source_url: "https://social.example/groups/g1/".into(),
            category: EntityCategory::Public,
            scale: 100,
            activity: ActivitySignals::default(),
            discovered_at: Utc::now(),
        }
    }

    struct Toggle(AtomicBool);

    impl AccessGuard for Toggle {
        fn allowed(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn gated_step_denies_then_allows() {
        let guard = Arc::new(Toggle(AtomicBool::new(false)));
        let step = GatedStep::new(
            FnStep(|_: &EntityRecord| Ok(EngageOutcome::committed("sent"))),
            guard.clone(),
        );

        assert!(step.engage(&item()).await.is_err());

        guard.0.store(true, Ordering::SeqCst);
        let outcome = step.engage(&item()).await.unwrap();
        assert!(outcome.committed);
    }

    #[tokio::test]
    async fn instrumented_step_is_transparent() {
        let step = InstrumentedStep::new(FnStep(|_: &EntityRecord| {
            Ok(EngageOutcome::abandoned())
        }));
        let outcome = step.engage(&item()).await.unwrap();
        assert!(outcome.engaged);
        assert!(!outcome.committed);
    }
}
