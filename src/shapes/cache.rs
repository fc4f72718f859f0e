//! # Shape Cache
//!
//! Session-lifetime storage for resolved shapes plus the index that says
//! where to fetch the ones that are not resolved yet.
//!
//! Every shape name owns one fetch cell. Generators that ask for the same
//! shape share that cell, so a shape is fetched at most once per session even
//! when a superseded generator is still fetching it.

use super::{Shape, ShapeDescriptor, ShapeIndex, ShapeSource};
use crate::{RoundgenError, RoundgenResult};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Fetch cell shared by every resolver of one shape name.
pub type ShapeSlot = Arc<OnceCell<Arc<Shape>>>;

/// Capability handed to generators for reading and filling the shape cache.
pub trait ShapeCache: Send + Sync {
    /// A previously resolved shape.
    fn get(&self, name: &str) -> Option<Arc<Shape>>;

    /// Stores a resolved shape under its name.
    fn put(&self, name: &str, shape: Arc<Shape>);

    /// Where to fetch a shape from, if the name is known at all.
    fn describe(&self, name: &str) -> Option<ShapeDescriptor>;

    /// The fetch cell for `name`, created on first use.
    fn slot(&self, name: &str) -> ShapeSlot;
}

/// When cached shapes are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Shapes live as long as the cache; [`SessionShapeCache::evict`] is a no-op.
    #[default]
    Never,
}

/// Append-only cache shared by every generator of one session.
#[derive(Debug, Default)]
pub struct SessionShapeCache {
    index: Mutex<ShapeIndex>,
    slots: Mutex<HashMap<String, ShapeSlot>>,
    eviction: EvictionPolicy,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionShapeCache {
    /// Creates an empty cache with no index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that already knows the shape index.
    pub fn with_index(index: ShapeIndex) -> Self {
        Self {
            index: Mutex::new(index),
            ..Self::default()
        }
    }

    /// Fetches `index.json` from the source and replaces the known index.
    pub async fn load_index(&self, source: &dyn ShapeSource) -> RoundgenResult<usize> {
        let index = source.fetch_index().await?;
        let count = index.len();
        *lock(&self.index) = index;
        debug!("Loaded shape index with {} entries", count);
        Ok(count)
    }

    /// Names of all shapes in the index.
    pub fn shape_names(&self) -> Vec<String> {
        lock(&self.index).keys().cloned().collect()
    }

    /// Number of resolved shapes held.
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Applies the eviction policy and returns how many shapes were dropped.
    pub fn evict(&self) -> usize {
        match self.eviction {
            EvictionPolicy::Never => 0,
        }
    }
}

impl ShapeCache for SessionShapeCache {
    fn get(&self, name: &str) -> Option<Arc<Shape>> {
        lock(&self.slots).get(name).and_then(|slot| slot.get().cloned())
    }

    fn put(&self, name: &str, shape: Arc<Shape>) {
        // first value wins; a cached shape is never replaced
        let _ = self.slot(name).set(shape);
    }

    fn describe(&self, name: &str) -> Option<ShapeDescriptor> {
        lock(&self.index).get(name).cloned()
    }

    fn slot(&self, name: &str) -> ShapeSlot {
        lock(&self.slots)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}

fn checkpoint(token: &CancellationToken) -> RoundgenResult<()> {
    if token.is_cancelled() {
        Err(RoundgenError::Cancelled)
    } else {
        Ok(())
    }
}

/// Resolves shape names to shapes, fetching and caching the ones not seen yet.
///
/// Repeated names are resolved once. Names missing from the index are
/// skipped with a warning. A fetch already running for the same name, even
/// in another generator, is awaited instead of repeated, and a fetched shape
/// is cached before cancellation is checked again. The result is sorted by
/// name so that iteration order does not depend on the request.
pub async fn resolve_shapes(
    names: &[String],
    cache: &dyn ShapeCache,
    source: &dyn ShapeSource,
    token: &CancellationToken,
) -> RoundgenResult<Vec<Arc<Shape>>> {
    let mut handled: HashSet<&str> = HashSet::new();
    let mut shapes: Vec<Arc<Shape>> = Vec::with_capacity(names.len());

    for name in names {
        checkpoint(token)?;
        if !handled.insert(name.as_str()) {
            continue;
        }

        if let Some(shape) = cache.get(name) {
            shapes.push(shape);
            continue;
        }

        let Some(descriptor) = cache.describe(name) else {
            warn!("Unknown shape {:?}, skipping", name);
            continue;
        };

        let slot = cache.slot(name);
        let shape = slot
            .get_or_try_init(|| async {
                debug!("Fetching shape {} from {}", name, descriptor.relative_path);
                let shape = source.fetch_shape(&descriptor.relative_path).await?;
                Ok::<_, RoundgenError>(Arc::new(shape))
            })
            .await?
            .clone();
        checkpoint(token)?;

        shapes.push(shape);
    }

    shapes.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(shapes)
}
