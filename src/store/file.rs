//! # JSON File Store
//!
//! Persisted state kept as one JSON document on disk. Each write rewrites the
//! document into a temporary sibling file and renames it over the current one,
//! so readers see either the old or the new tree, never a mix.

use super::{get_in_tree, set_in_tree, PersistedStore};
use crate::{RoundgenError, RoundgenResult};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Store backed by a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn load(&self) -> RoundgenResult<Value> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Value::Null),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Value::Null),
            Err(e) => Err(RoundgenError::Connectivity(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl PersistedStore for JsonFileStore {
    async fn set(&self, path: &str, value: Value) -> RoundgenResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.load().await?;
        set_in_tree(&mut root, path, value)?;

        let temp = self.temp_path();
        let contents = serde_json::to_vec_pretty(&root)?;
        let connectivity = |e: std::io::Error| {
            RoundgenError::Connectivity(format!("cannot write {}: {}", self.path.display(), e))
        };
        tokio::fs::write(&temp, contents).await.map_err(connectivity)?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(connectivity)?;
        debug!("Wrote {} in {}", path, self.path.display());
        Ok(())
    }

    async fn get(&self, path: &str) -> RoundgenResult<Option<Value>> {
        let root = self.load().await?;
        Ok(get_in_tree(&root, path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStore::new(&path);
        store.set("rooms/a/rounds", json!({"0": {"x": 1}})).await.unwrap();
        store.set("rooms/b/rounds", json!({"0": {"x": 2}})).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get("rooms/a/rounds/0/x").await.unwrap(),
            Some(json!(1))
        );
        assert_eq!(
            reopened.get("rooms/b/rounds/0/x").await.unwrap(),
            Some(json!(2))
        );
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unwritable_location_is_connectivity_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("no/such/dir/state.json"));
        assert!(matches!(
            store.set("room", json!(1)).await,
            Err(RoundgenError::Connectivity(_))
        ));
    }
}
