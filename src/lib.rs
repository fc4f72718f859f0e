//! # Roundgen
//!
//! Round and rendezvous generation for a multiplayer street-imagery geography game.
//!
//! ## Architecture Overview
//!
//! A game room needs a set of locations that are known to have ground-level
//! imagery before anybody can play. Producing them is the job of this crate:
//!
//! - **Geo**: coordinates, bounding boxes and polygon membership
//! - **Shapes**: weighted named regions, their index, sources and the session cache
//! - **Imagery**: the oracle answering "nearest imagery within a radius"
//! - **Store**: the shared persisted state the finished rounds are written to
//! - **Generation**: sampling plus validation into a Round Set or Rendezvous State
//! - **Session**: owns generator lifecycles, supersedes and awaits them
//!
//! Generation is cooperative: every generator carries a cancellation token that
//! is checked around each suspension point, and the complete result is written
//! in a single replace of the target path so that no partial rounds are ever
//! committed.

pub mod generation;
pub mod geo;
pub mod imagery;
pub mod session;
pub mod shapes;
pub mod store;

pub use generation::{
    GameMode, GenerationConfig, GenerationHandle, GenerationOutput, GenerationRequest,
    GenerationServices, Generator, GeneratorStatus, PlayerData, RendezvousState, Round, RoundSet,
    Sampler,
};
pub use geo::{BoundingBox, CandidatePoint, LatLng};
pub use imagery::{ImageryOracle, StreetViewOracle};
pub use session::SessionController;
pub use shapes::{
    DirShapeSource, HttpShapeSource, SessionShapeCache, Shape, ShapeCache, ShapeDescriptor,
    ShapeIndex, ShapeSource,
};
pub use store::{JsonFileStore, MemoryStore, PersistedStore};

/// Core error type for round generation.
#[derive(thiserror::Error, Debug)]
pub enum RoundgenError {
    /// A checkpoint observed the cancellation token
    #[error("Generation cancelled")]
    Cancelled,

    /// Not enough valid locations could be found
    #[error("Could not find enough valid points: {0}")]
    Exhausted(String),

    /// The persisted state could not be written
    #[error("Cannot connect to the backing store: {0}")]
    Connectivity(String),

    /// Shape data or a sampling invariant is corrupt
    #[error("Data integrity failure: {0}")]
    DataIntegrity(String),

    /// The imagery lookup failed with an unexpected status
    #[error("Imagery lookup failed: {0}")]
    Oracle(String),

    /// The geometry source could not be reached
    #[error("Shape fetch failed: {0}")]
    ShapeFetch(String),

    /// The generation request is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A generation task panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RoundgenError {
    /// Returns true for the expected cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RoundgenError::Cancelled)
    }

    /// Text suitable for showing to a player.
    ///
    /// Underlying causes are left to the logs; only exhaustion gets an
    /// actionable message.
    pub fn user_message(&self) -> String {
        match self {
            RoundgenError::Cancelled => "Generation was cancelled.".to_string(),
            RoundgenError::Exhausted(_) => {
                "Could not find enough locations with imagery. Try choosing different regions."
                    .to_string()
            }
            RoundgenError::Connectivity(_) => "Cannot connect to the game server.".to_string(),
            RoundgenError::InvalidRequest(reason) => format!("Invalid game settings: {}", reason),
            _ => "Something went wrong while generating the game.".to_string(),
        }
    }
}

/// Result type used throughout the crate.
pub type RoundgenResult<T> = Result<T, RoundgenError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generation configuration constants.
pub mod config {
    /// Number of rounds in a classic game
    pub const DEFAULT_ROUND_COUNT: usize = 5;

    /// Sample-and-lookup attempts per slot when sampling the whole sphere
    pub const SPHERE_MODE_ATTEMPTS: u32 = 30;

    /// Sample-and-lookup attempts per slot when sampling shapes or a point list
    pub const TARGETED_MODE_ATTEMPTS: u32 = 60;

    /// Imagery lookup radius used when none is given, in meters
    pub const DEFAULT_LOOKUP_RADIUS_METERS: f64 = 40_000.0;

    /// Bounding-box rejection attempts before a shape is declared pathological
    pub const MAX_SHAPE_SAMPLING_ATTEMPTS: u64 = 10_000_000;

    /// Name of the shape index document
    pub const SHAPE_INDEX_FILE: &str = "index.json";

    /// Environment variable holding the shape base location
    pub const LOCATIONS_DIR_ENV: &str = "ROUNDGEN_LOCATIONS_DIR";

    /// Environment variable holding the imagery API key
    pub const STREETVIEW_API_KEY_ENV: &str = "STREETVIEW_API_KEY";
}
