//! Key-value persistence collaborator
//!
//! The engine assumes an external async key-value substrate with single-key
//! atomicity and nothing more. Two implementations ship with the crate: an
//! in-memory map for tests and short-lived runs, and a JSON file store that
//! survives process restarts via write-to-temp-then-rename.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::StoreError;

/// Async key-value persistence. `get` returns only the keys that exist;
/// `set` upserts every entry; `remove` ignores unknown keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Volatile in-memory store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let inner = self.inner.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| inner.get(*k).map(|v| ((*k).to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for key in keys {
            inner.remove(*key);
        }
        Ok(())
    }
}

/// Durable store keeping the whole map in one JSON document.
///
/// Writes land in a sibling temp file first and are renamed into place, so
/// a crash mid-write leaves the previous document intact. The internal
/// mutex serializes read-modify-write cycles within this process.
#[derive(Debug)]
pub struct JsonFileKvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                key: self.path.display().to_string(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    async fn persist(&self, map: &HashMap<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!(path = %self.path.display(), entries = map.len(), "persisted kv document");
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileKvStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let map = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|k| map.get(*k).map(|v| ((*k).to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.extend(entries);
        self.persist(&map).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        let mut changed = false;
        for key in keys {
            changed |= map.remove(*key).is_some();
        }
        if changed {
            self.persist(&map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryKvStore::new();
        store
            .set(HashMap::from([("a".to_string(), json!({"n": 1}))]))
            .await
            .unwrap();

        let got = store.get(&["a", "missing"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"]["n"], 1);

        store.remove(&["a", "missing"]).await.unwrap();
        assert!(store.get(&["a"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonFileKvStore::new(&path);
            store
                .set(HashMap::from([("cursors".to_string(), json!({"g": 3}))]))
                .await
                .unwrap();
        }

        let reopened = JsonFileKvStore::new(&path);
        let got = reopened.get(&["cursors"]).await.unwrap();
        assert_eq!(got["cursors"]["g"], 3);
    }

    #[tokio::test]
    async fn file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileKvStore::new(dir.path().join("absent.json"));
        assert!(store.get(&["anything"]).await.unwrap().is_empty());
        // Removing from an absent document is a no-op, not an error.
        store.remove(&["anything"]).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = JsonFileKvStore::new(&path);
        let err = store.get(&["a"]).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
