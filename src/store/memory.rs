//! # Memory Store
//!
//! In-process persisted state, used for tests and single-process sessions.

use super::{get_in_tree, set_in_tree, PersistedStore};
use crate::{RoundgenError, RoundgenResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// JSON tree held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    root: Mutex<Value>,
    writes: AtomicUsize,
    offline: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Null),
            writes: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every following operation fail as unreachable (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.root().clone()
    }

    fn root(&self) -> MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self) -> RoundgenResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RoundgenError::Connectivity("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistedStore for MemoryStore {
    async fn set(&self, path: &str, value: Value) -> RoundgenResult<()> {
        self.ensure_online()?;
        set_in_tree(&mut self.root(), path, value)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, path: &str) -> RoundgenResult<Option<Value>> {
        self.ensure_online()?;
        Ok(get_in_tree(&self.root(), path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store.set("room/rounds", json!({"0": 1})).await.unwrap();
        assert_eq!(store.get("room/rounds/0").await.unwrap(), Some(json!(1)));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_rejects_writes() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.set("room", json!(1)).await,
            Err(RoundgenError::Connectivity(_))
        ));
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.snapshot(), Value::Null);
    }
}
