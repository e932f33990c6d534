//! Resume cursor persistence
//!
//! Per-target monotonic cursor plus a capped processed-item log, stored
//! under a single key so `last_index` and the log entry always land
//! together (single-key atomicity is all the substrate guarantees). The
//! store also owns the persisted rate counters, since both are written on
//! the same confirmed-success path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::constants::{KEY_CURSORS, KEY_RATE_COUNTERS, PROCESSED_LOG_CAP};
use crate::error::StoreError;
use crate::infrastructure::KvStore;

use super::rate_policy::RateCounters;

/// One confirmed interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedEntry {
    pub item_id: String,
    pub ts: DateTime<Utc>,
    pub summary: Option<String>,
}

/// Persisted cursor state for one target.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CursorRecord {
    pub last_index: u64,
    pub processed_log: Vec<ProcessedEntry>,
}

impl CursorRecord {
    /// Applies one confirmed success: append to the log, advance
    /// `last_index` monotonically, truncate the oldest entries beyond
    /// `cap`. Truncation never touches `last_index`.
    pub fn apply_success(
        &mut self,
        item_id: &str,
        absolute_index: u64,
        summary: Option<String>,
        ts: DateTime<Utc>,
        cap: usize,
    ) {
        self.processed_log.push(ProcessedEntry {
            item_id: item_id.to_string(),
            ts,
            summary,
        });
        if self.processed_log.len() > cap {
            let excess = self.processed_log.len() - cap;
            self.processed_log.drain(..excess);
        }
        self.last_index = self.last_index.max(absolute_index + 1);
    }
}

/// What a caller needs to resume: the starting offset and the lifetime
/// statistics count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub last_index: u64,
    pub processed_count: usize,
}

/// Cursor store over the key-value collaborator. Logically sequential per
/// target; cross-target locking is unnecessary because each target's
/// cursor is independent and all writes replace the single cursors key.
pub struct CursorStore {
    store: Arc<dyn KvStore>,
    log_cap: usize,
}

impl CursorStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            log_cap: PROCESSED_LOG_CAP,
        }
    }

    pub fn with_log_cap(store: Arc<dyn KvStore>, log_cap: usize) -> Self {
        Self { store, log_cap }
    }

    /// Cursor for `target`, defaulting to zero for unknown targets. Never
    /// fails just because a target has no history.
    pub async fn cursor(&self, target: &str) -> Result<CursorSnapshot, StoreError> {
        let map = self.load_cursors().await?;
        let record = map.get(target).cloned().unwrap_or_default();
        Ok(CursorSnapshot {
            last_index: record.last_index,
            processed_count: record.processed_log.len(),
        })
    }

    /// Records a confirmed interaction. Both the log entry and
    /// `last_index` are persisted in one key write.
    pub async fn record_success(
        &self,
        target: &str,
        item_id: &str,
        absolute_index: u64,
        summary: Option<String>,
    ) -> Result<(), StoreError> {
        let mut map = self.load_cursors().await?;
        let record = map.entry(target.to_string()).or_default();
        record.apply_success(item_id, absolute_index, summary, Utc::now(), self.log_cap);
        debug!(
            target,
            item_id,
            last_index = record.last_index,
            "recorded confirmed interaction"
        );
        self.save_cursors(&map).await
    }

    /// Idempotent: succeeds even when there is nothing to reset.
    pub async fn reset_target(&self, target: &str) -> Result<(), StoreError> {
        let mut map = self.load_cursors().await?;
        if map.remove(target).is_some() {
            self.save_cursors(&map).await?;
        }
        Ok(())
    }

    /// Idempotent: succeeds even when there is nothing to reset.
    pub async fn reset_all(&self) -> Result<(), StoreError> {
        self.store.remove(&[KEY_CURSORS]).await
    }

    /// Current rate counters, rolled to `now`.
    pub async fn counters(&self, now: DateTime<Utc>) -> Result<RateCounters, StoreError> {
        let got = self.store.get(&[KEY_RATE_COUNTERS]).await?;
        let counters = match got.get(KEY_RATE_COUNTERS) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                StoreError::Corrupt {
                    key: KEY_RATE_COUNTERS.to_string(),
                    source: e,
                }
            })?,
            None => RateCounters::default(),
        };
        Ok(counters.rolled(now))
    }

    /// Persists one performed action into the counters.
    pub async fn record_action(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut counters = self.counters(now).await?;
        counters.record_action(now);
        let value = serde_json::to_value(&counters)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store
            .set(HashMap::from([(KEY_RATE_COUNTERS.to_string(), value)]))
            .await
    }

    async fn load_cursors(&self) -> Result<HashMap<String, CursorRecord>, StoreError> {
        let got = self.store.get(&[KEY_CURSORS]).await?;
        match got.get(KEY_CURSORS) {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| StoreError::Corrupt {
                    key: KEY_CURSORS.to_string(),
                    source: e,
                })
            }
            None => Ok(HashMap::new()),
        }
    }

    async fn save_cursors(
        &self,
        map: &HashMap<String, CursorRecord>,
    ) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(map).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store
            .set(HashMap::from([(KEY_CURSORS.to_string(), value)]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryKvStore;
    use proptest::prelude::*;

    fn store() -> CursorStore {
        CursorStore::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn unknown_target_reads_as_zero() {
        let cursors = store();
        let snap = cursors.cursor("never-seen").await.unwrap();
        assert_eq!(snap.last_index, 0);
        assert_eq!(snap.processed_count, 0);
    }

    #[tokio::test]
    async fn skipped_item_leaves_a_log_gap_but_advances_past_later_commits() {
        // Items A(0), B(1), C(2); B never commits.
        let cursors = store();
        cursors.record_success("g", "A", 0, None).await.unwrap();
        cursors
            .record_success("g", "C", 2, Some("sent".into()))
            .await
            .unwrap();

        let snap = cursors.cursor("g").await.unwrap();
        assert_eq!(snap.last_index, 3);
        assert_eq!(snap.processed_count, 2);
    }

    #[tokio::test]
    async fn log_cap_truncates_oldest_without_touching_last_index() {
        let cursors = CursorStore::with_log_cap(Arc::new(MemoryKvStore::new()), 3);
        for i in 0..5u64 {
            cursors
                .record_success("g", &format!("item-{i}"), i, None)
                .await
                .unwrap();
        }

        let snap = cursors.cursor("g").await.unwrap();
        assert_eq!(snap.last_index, 5);
        assert_eq!(snap.processed_count, 3);
    }

    #[tokio::test]
    async fn targets_are_independent() {
        let cursors = store();
        cursors.record_success("g1", "a", 4, None).await.unwrap();

        assert_eq!(cursors.cursor("g1").await.unwrap().last_index, 5);
        assert_eq!(cursors.cursor("g2").await.unwrap().last_index, 0);

        cursors.reset_target("g1").await.unwrap();
        assert_eq!(cursors.cursor("g1").await.unwrap().last_index, 0);
        // Resetting again, or resetting nothing, still succeeds.
        cursors.reset_target("g1").await.unwrap();
        cursors.reset_all().await.unwrap();
        cursors.reset_all().await.unwrap();
    }

    #[tokio::test]
    async fn cursor_survives_a_new_store_over_the_same_substrate() {
        let kv: Arc<MemoryKvStore> = Arc::new(MemoryKvStore::new());
        CursorStore::new(kv.clone())
            .record_success("g", "a", 0, None)
            .await
            .unwrap();

        let reopened = CursorStore::new(kv);
        assert_eq!(reopened.cursor("g").await.unwrap().last_index, 1);
    }

    proptest! {
        #[test]
        fn last_index_is_monotonic_and_tracks_the_max(indices in proptest::collection::vec(0u64..1_000, 1..50)) {
            let mut record = CursorRecord::default();
            let mut previous = 0;
            for (n, idx) in indices.iter().enumerate() {
                record.apply_success(&format!("item-{n}"), *idx, None, Utc::now(), usize::MAX);
                prop_assert!(record.last_index >= previous);
                previous = record.last_index;
            }
            let max = indices.iter().copied().max().unwrap();
            prop_assert_eq!(record.last_index, max + 1);
        }
    }
}
