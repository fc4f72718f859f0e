//! # Session Controller
//!
//! Owns the generators of one game session. Triggering a regeneration starts a
//! fresh generator right away and cancels the previous one without waiting
//! for it; [`SessionController::wait_for_generation`] later settles every
//! generator that was started, so a game phase transition only happens once
//! the final rounds are committed.
//!
//! The controller is the only writer discipline the persisted room path has:
//! at most one generator per regeneration cycle survives to its write step.

use crate::generation::{
    GenerationConfig, GenerationHandle, GenerationOutput, GenerationRequest, GenerationServices,
    Generator, GeneratorId, GeneratorStatus,
};
use crate::imagery::ImageryOracle;
use crate::shapes::{SessionShapeCache, ShapeCache, ShapeSource};
use crate::store::PersistedStore;
use crate::{RoundgenError, RoundgenResult};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Coordinates generator lifecycles and the session's shape cache.
pub struct SessionController {
    cache: Arc<SessionShapeCache>,
    services: GenerationServices,
    config: GenerationConfig,
    current: Option<GenerationHandle>,
    superseded: Vec<GenerationHandle>,
}

impl SessionController {
    /// Creates a controller with a fresh, empty shape cache.
    pub fn new(
        source: Arc<dyn ShapeSource>,
        oracle: Arc<dyn ImageryOracle>,
        store: Arc<dyn PersistedStore>,
        config: GenerationConfig,
    ) -> Self {
        Self::with_cache(Arc::new(SessionShapeCache::new()), source, oracle, store, config)
    }

    /// Creates a controller around an existing shape cache.
    pub fn with_cache(
        cache: Arc<SessionShapeCache>,
        source: Arc<dyn ShapeSource>,
        oracle: Arc<dyn ImageryOracle>,
        store: Arc<dyn PersistedStore>,
        config: GenerationConfig,
    ) -> Self {
        let shared: Arc<dyn ShapeCache> = cache.clone();
        Self {
            cache,
            services: GenerationServices::new(shared, source, oracle, store),
            config,
            current: None,
            superseded: Vec::new(),
        }
    }

    /// Fetches the shape index so that shape names can be resolved.
    pub async fn load_shape_index(&self) -> RoundgenResult<usize> {
        self.cache.load_index(self.services.source.as_ref()).await
    }

    pub fn shape_cache(&self) -> &Arc<SessionShapeCache> {
        &self.cache
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Starts a new generator for the room and cancels the running one, if any.
    ///
    /// Does not wait for the previous generator; it is settled by the next
    /// [`wait_for_generation`](Self::wait_for_generation).
    pub fn trigger_regeneration(
        &mut self,
        room_path: &str,
        request: GenerationRequest,
    ) -> RoundgenResult<GeneratorId> {
        let generator = Generator::new(room_path, request, self.config.clone())?;
        let id = generator.id();
        let handle = generator.start(self.services.clone());

        if let Some(previous) = self.current.replace(handle) {
            debug!("Generator {} superseded by {}", previous.id(), id);
            previous.cancel();
            self.superseded.push(previous);
        }
        info!("Triggered generator {} for {}", id, room_path);
        Ok(id)
    }

    /// The generator whose result will be kept.
    pub fn active_generator(&self) -> Option<GeneratorId> {
        self.current.as_ref().map(|h| h.id())
    }

    pub fn active_status(&self) -> Option<GeneratorStatus> {
        self.current.as_ref().map(|h| h.status())
    }

    /// Whether cancellation of the active generator has been requested.
    pub fn is_cancelling(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|h| h.is_cancel_requested())
    }

    /// Number of generators started and not yet settled.
    pub fn pending_count(&self) -> usize {
        self.superseded.len() + usize::from(self.current.is_some())
    }

    /// Cancels every generator this controller started.
    pub fn cancel_all(&mut self) {
        for handle in self.superseded.iter().chain(self.current.iter()) {
            handle.cancel();
        }
    }

    /// Waits for every pending generator to settle and returns the output of
    /// the active one.
    ///
    /// Cancellation of superseded generators is expected and swallowed. Any
    /// other outcome of a superseded generator is only logged. The active
    /// generator's result is returned as is; its cancellation is logged as an
    /// error only when nobody asked for it. `Ok(None)` means nothing was
    /// pending.
    pub async fn wait_for_generation(&mut self) -> RoundgenResult<Option<GenerationOutput>> {
        for handle in std::mem::take(&mut self.superseded) {
            let id = handle.id();
            match handle.wait().await {
                Err(RoundgenError::Cancelled) => debug!("Superseded generator {} cancelled", id),
                Ok(_) => warn!(
                    "Superseded generator {} committed before observing cancellation",
                    id
                ),
                Err(e) => error!("Superseded generator {} failed: {}", id, e),
            }
        }

        let Some(current) = self.current.take() else {
            return Ok(None);
        };
        let id = current.id();
        let cancel_requested = current.is_cancel_requested();
        match current.wait().await {
            Ok(output) => Ok(Some(output)),
            Err(RoundgenError::Cancelled) if cancel_requested => {
                debug!("Active generator {} cancelled on request", id);
                Err(RoundgenError::Cancelled)
            }
            Err(RoundgenError::Cancelled) => {
                error!("Active generator {} was cancelled unexpectedly", id);
                Err(RoundgenError::Cancelled)
            }
            Err(e) => {
                error!("Active generator {} failed: {}", id, e);
                Err(e)
            }
        }
    }
}
