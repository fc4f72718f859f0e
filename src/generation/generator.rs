//! # Round Generator
//!
//! A [`Generator`] is a single-use orchestrator. It resolves the requested
//! shapes, fills every slot with a confirmed position by sampling candidates
//! and asking the imagery oracle about them, and then writes the complete
//! result to the room in one replace.
//!
//! Cancellation is cooperative. The generator's token is checked before and
//! after every suspension point (shape fetches, oracle lookups, the final
//! write) and before each sampling attempt. An in-flight call is never
//! interrupted; cancellation only prevents further work from starting.

use super::{
    GameMode, GenerationConfig, GenerationOutput, GenerationRequest, PlayerData,
    RendezvousState, Round, RoundSet, Sampler,
};
use crate::geo::LatLng;
use crate::imagery::ImageryOracle;
use crate::shapes::{resolve_shapes, ShapeCache, ShapeSource};
use crate::store::{child_path, PersistedStore};
use crate::{RoundgenError, RoundgenResult};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier of one generator, used in logs.
pub type GeneratorId = Uuid;

/// Lifecycle of a generator.
///
/// `Idle -> Running -> {Completed | Cancelled | Failed}`; the last three are
/// terminal and mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratorStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl GeneratorStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GeneratorStatus::Completed | GeneratorStatus::Cancelled | GeneratorStatus::Failed
        )
    }
}

/// External collaborators a generator works against.
#[derive(Clone)]
pub struct GenerationServices {
    pub cache: Arc<dyn ShapeCache>,
    pub source: Arc<dyn ShapeSource>,
    pub oracle: Arc<dyn ImageryOracle>,
    pub store: Arc<dyn PersistedStore>,
}

impl GenerationServices {
    pub fn new(
        cache: Arc<dyn ShapeCache>,
        source: Arc<dyn ShapeSource>,
        oracle: Arc<dyn ImageryOracle>,
        store: Arc<dyn PersistedStore>,
    ) -> Self {
        Self {
            cache,
            source,
            oracle,
            store,
        }
    }
}

/// Single-use orchestrator producing a Round Set or Rendezvous State.
#[derive(Debug)]
pub struct Generator {
    id: GeneratorId,
    room_path: String,
    request: GenerationRequest,
    config: GenerationConfig,
    token: CancellationToken,
    status: watch::Sender<GeneratorStatus>,
}

impl Generator {
    /// Creates an idle generator for the room at `room_path`.
    pub fn new(
        room_path: impl Into<String>,
        request: GenerationRequest,
        config: GenerationConfig,
    ) -> RoundgenResult<Self> {
        request.validate()?;
        config.validate()?;
        let (status, _) = watch::channel(GeneratorStatus::Idle);
        Ok(Self {
            id: Uuid::new_v4(),
            room_path: room_path.into(),
            request,
            config,
            token: CancellationToken::new(),
            status,
        })
    }

    pub fn id(&self) -> GeneratorId {
        self.id
    }

    pub fn room_path(&self) -> &str {
        &self.room_path
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn status(&self) -> GeneratorStatus {
        *self.status.borrow()
    }

    /// Receiver following the status of this generator.
    pub fn subscribe(&self) -> watch::Receiver<GeneratorStatus> {
        self.status.subscribe()
    }

    /// A token sharing this generator's cancellation state.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests cancellation. Idempotent and irreversible.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Spawns the run on the runtime and returns a handle to it.
    pub fn start(self, services: GenerationServices) -> GenerationHandle {
        let id = self.id;
        let token = self.cancellation_token();
        let status = self.subscribe();
        let task = tokio::spawn(self.run(services));
        GenerationHandle {
            id,
            token,
            status,
            task,
        }
    }

    /// Runs the generation to a terminal state. Consumes the generator, so a
    /// generator can never be restarted.
    pub async fn run(self, services: GenerationServices) -> RoundgenResult<GenerationOutput> {
        self.status.send_replace(GeneratorStatus::Running);
        info!(
            "Generator {} starting {} generation for {}",
            self.id, self.request.mode, self.room_path
        );

        let result = self.generate(&services).await;

        let status = match &result {
            Ok(_) => GeneratorStatus::Completed,
            Err(e) if e.is_cancelled() => GeneratorStatus::Cancelled,
            Err(_) => GeneratorStatus::Failed,
        };
        self.status.send_replace(status);

        match &result {
            Ok(output) => info!(
                "Generator {} committed {} positions to {}",
                self.id,
                output.positions().len(),
                self.room_path
            ),
            Err(RoundgenError::Cancelled) => info!("Generator {} cancelled", self.id),
            Err(e @ RoundgenError::DataIntegrity(_)) => {
                error!("Generator {} hit corrupt data: {}", self.id, e)
            }
            Err(e) => warn!("Generator {} failed: {}", self.id, e),
        }
        result
    }

    fn checkpoint(&self) -> RoundgenResult<()> {
        if self.token.is_cancelled() {
            Err(RoundgenError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn generate(&self, services: &GenerationServices) -> RoundgenResult<GenerationOutput> {
        let mut rng = self.config.create_rng();
        let mut sampler = self.build_sampler(services, &mut rng).await?;
        let radius = self.lookup_radius(&sampler);
        debug!(
            "Generator {} sampling by {} with {}m lookup radius",
            self.id,
            sampler.strategy_name(),
            radius
        );

        let output = match self.request.mode {
            GameMode::Classic => {
                let mut rounds = RoundSet::new();
                for index in 0..self.config.round_count {
                    let label = format!("round {}", index);
                    let position = self
                        .fill_slot(&mut sampler, &mut rng, services.oracle.as_ref(), radius, &label)
                        .await?;
                    rounds.insert(index, Round { map_position: position });
                }
                GenerationOutput::Rounds(rounds)
            }
            GameMode::Rendezvous => {
                let mut player_data = BTreeMap::new();
                for participant in self.request.unique_participants() {
                    let label = format!("participant {}", participant);
                    let position = self
                        .fill_slot(&mut sampler, &mut rng, services.oracle.as_ref(), radius, &label)
                        .await?;
                    player_data.insert(participant, PlayerData::starting_at(position));
                }
                GenerationOutput::Rendezvous(RendezvousState {
                    player_data,
                    finished: false,
                })
            }
        };

        self.commit(services.store.as_ref(), &output).await?;
        Ok(output)
    }

    async fn build_sampler(
        &self,
        services: &GenerationServices,
        rng: &mut StdRng,
    ) -> RoundgenResult<Sampler> {
        self.checkpoint()?;
        let shapes = if self.request.points.is_empty() && !self.request.shape_names.is_empty() {
            let shapes = resolve_shapes(
                &self.request.shape_names,
                services.cache.as_ref(),
                services.source.as_ref(),
                &self.token,
            )
            .await?;
            if shapes.is_empty() {
                warn!(
                    "Generator {}: none of the shapes {:?} are known, sampling the whole sphere",
                    self.id, self.request.shape_names
                );
            }
            shapes
        } else {
            Vec::new()
        };
        self.checkpoint()?;
        Sampler::for_inputs(&self.request.points, shapes, rng)
    }

    fn lookup_radius(&self, sampler: &Sampler) -> f64 {
        match sampler {
            Sampler::Points(_) => self
                .request
                .precision_meters
                .unwrap_or(self.config.lookup_radius_meters),
            _ => self.config.lookup_radius_meters,
        }
    }

    async fn fill_slot(
        &self,
        sampler: &mut Sampler,
        rng: &mut StdRng,
        oracle: &dyn ImageryOracle,
        radius: f64,
        label: &str,
    ) -> RoundgenResult<LatLng> {
        let bound = sampler.attempt_bound(&self.config);
        for attempt in 1..=bound {
            self.checkpoint()?;
            let Some(candidate) = sampler.next_candidate(rng, &self.config)? else {
                return Err(RoundgenError::Exhausted(format!(
                    "point list ran out while filling {}",
                    label
                )));
            };

            self.checkpoint()?;
            let found = oracle.lookup_nearest_imagery(candidate, radius).await?;
            self.checkpoint()?;

            match found {
                Some(position) if position.is_valid() => {
                    debug!(
                        "Generator {} filled {} after {} attempts",
                        self.id, label, attempt
                    );
                    return Ok(position);
                }
                Some(position) => {
                    return Err(RoundgenError::Oracle(format!(
                        "oracle returned out-of-range position {:?}",
                        position
                    )));
                }
                None => debug!(
                    "Generator {}: no imagery near {:?} for {} (attempt {}/{})",
                    self.id, candidate, label, attempt, bound
                ),
            }
        }

        Err(RoundgenError::Exhausted(format!(
            "no imagery found for {} after {} attempts",
            label, bound
        )))
    }

    async fn commit(
        &self,
        store: &dyn PersistedStore,
        output: &GenerationOutput,
    ) -> RoundgenResult<()> {
        let value = output.to_value()?;
        let path = child_path(&self.room_path, output.target_child());

        self.checkpoint()?;
        store.set(&path, value).await.map_err(|e| {
            error!("Generator {} failed to write {}: {}", self.id, path, e);
            match e {
                RoundgenError::Connectivity(_) => e,
                other => RoundgenError::Connectivity(other.to_string()),
            }
        })
    }
}

/// Handle to a spawned generator run.
#[derive(Debug)]
pub struct GenerationHandle {
    id: GeneratorId,
    token: CancellationToken,
    status: watch::Receiver<GeneratorStatus>,
    task: JoinHandle<RoundgenResult<GenerationOutput>>,
}

impl GenerationHandle {
    pub fn id(&self) -> GeneratorId {
        self.id
    }

    /// Requests cancellation of the run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn status(&self) -> GeneratorStatus {
        *self.status.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to reach a terminal state.
    pub async fn wait(self) -> RoundgenResult<GenerationOutput> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(RoundgenError::Cancelled),
            Err(e) => Err(RoundgenError::Internal(format!(
                "generator {} task failed: {}",
                self.id, e
            ))),
        }
    }
}
