//! Page-surface collaborators
//!
//! The engine never touches a browser directly. It sees the page through
//! two narrow traits: a read-only render-tree snapshot with a structural
//! change feed, and an idempotent growth trigger. `FixturePage` drives both
//! from scripted snapshots for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::PageError;

/// Read-only view of the rendered page.
#[async_trait]
pub trait PageView: Send + Sync {
    /// Serialized render tree (HTML) as currently rendered.
    async fn snapshot(&self) -> Result<String, PageError>;

    /// Structural-mutation feed. The value is an opaque generation counter;
    /// dropping the receiver is the unsubscribe.
    fn subscribe_changes(&self) -> watch::Receiver<u64>;
}

/// The single growth action (e.g. scroll-to-bottom). Idempotent, no return
/// value beyond delivery success.
#[async_trait]
pub trait GrowthTrigger: Send + Sync {
    async fn grow(&self) -> Result<(), PageError>;
}

/// Scripted page double: a sequence of snapshots, advanced one frame per
/// growth trigger and saturating at the last frame (the page stops
/// growing). Each advance bumps the change feed.
pub struct FixturePage {
    frames: Vec<String>,
    index: AtomicUsize,
    changes: watch::Sender<u64>,
}

impl FixturePage {
    pub fn new(frames: Vec<String>) -> Self {
        assert!(!frames.is_empty(), "fixture page needs at least one frame");
        let (changes, _) = watch::channel(0);
        Self {
            frames,
            index: AtomicUsize::new(0),
            changes,
        }
    }

    /// Current frame position, for assertions.
    pub fn frame_index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageView for FixturePage {
    async fn snapshot(&self) -> Result<String, PageError> {
        let idx = self.index.load(Ordering::SeqCst);
        Ok(self.frames[idx].clone())
    }

    fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl GrowthTrigger for FixturePage {
    async fn grow(&self) -> Result<(), PageError> {
        let last = self.frames.len() - 1;
        let prev = self
            .index
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| {
                Some((i + 1).min(last))
            })
            .unwrap_or(last);
        if prev < last {
            self.changes.send_modify(|generation| *generation += 1);
        }
        Ok(())
    }
}
