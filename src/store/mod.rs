//! # Store Module
//!
//! Shared persisted state that finished rounds are written to.
//!
//! State is a JSON tree addressed by slash-separated paths such as
//! `rooms/abc/rounds`. Writers always replace a whole child path in one
//! operation; there is no partial or merging write.

pub mod file;
pub mod memory;

pub use file::*;
pub use memory::*;

use crate::{RoundgenError, RoundgenResult};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Persisted shared state.
#[async_trait]
pub trait PersistedStore: Send + Sync {
    /// Atomically replaces the value at `path`.
    async fn set(&self, path: &str, value: Value) -> RoundgenResult<()>;

    /// Reads the value at `path`, if any.
    async fn get(&self, path: &str) -> RoundgenResult<Option<Value>>;
}

/// Joins path segments with a single slash.
///
/// # Examples
///
/// ```
/// use roundgen::store::child_path;
///
/// assert_eq!(child_path("rooms/abc/", "rounds"), "rooms/abc/rounds");
/// ```
pub fn child_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Non-empty segments of a path.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Replaces the node at `path` inside `root`, creating objects on the way.
///
/// Writing to the root path replaces the whole tree. Non-object nodes on the
/// way are overwritten by objects.
pub fn set_in_tree(root: &mut Value, path: &str, value: Value) -> RoundgenResult<()> {
    let segments = path_segments(path);
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .ok_or_else(|| RoundgenError::InvalidRequest(format!("bad path {}", path)))?
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Some(object) = node.as_object_mut() {
        object.insert(last.to_string(), value);
    }
    Ok(())
}

/// Looks up the node at `path` inside `root`.
pub fn get_in_tree<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path_segments(path)
        .into_iter()
        .try_fold(root, |node, segment| node.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut root = Value::Null;
        set_in_tree(&mut root, "rooms/abc/rounds", json!({"0": 1})).unwrap();
        assert_eq!(root, json!({"rooms": {"abc": {"rounds": {"0": 1}}}}));
    }

    #[test]
    fn test_set_replaces_whole_child() {
        let mut root = json!({"room": {"rounds": {"0": 1, "1": 2}, "name": "x"}});
        set_in_tree(&mut root, "room/rounds", json!({"0": 9})).unwrap();
        assert_eq!(root, json!({"room": {"rounds": {"0": 9}, "name": "x"}}));
    }

    #[test]
    fn test_set_root() {
        let mut root = json!({"a": 1});
        set_in_tree(&mut root, "/", json!(5)).unwrap();
        assert_eq!(root, json!(5));
    }

    #[test]
    fn test_get_in_tree() {
        let root = json!({"room": {"rounds": {"0": 1}}});
        assert_eq!(get_in_tree(&root, "room/rounds/0"), Some(&json!(1)));
        assert_eq!(get_in_tree(&root, "room/missing"), None);
        assert_eq!(get_in_tree(&root, ""), Some(&root));
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("", "rounds"), "rounds");
        assert_eq!(child_path("a/b", "/c"), "a/b/c");
    }
}
