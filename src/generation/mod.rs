//! # Generation Module
//!
//! Turns geographic constraints into locations that are known to have imagery
//! and commits them as the playable data of a room.
//!
//! Two game modes exist. Classic games get a fixed number of rounds, each
//! with one confirmed position. Rendezvous games get one starting position per
//! participant along with a movement history that begins at that position.

pub mod generator;
pub mod sampler;

pub use generator::*;
pub use sampler::*;

use crate::config;
use crate::geo::LatLng;
use crate::{RoundgenError, RoundgenResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Configuration for round generation.
///
/// Controls how many rounds are produced, how hard each slot is retried and
/// how far the imagery lookup searches from a sampled point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Random seed for reproducible sampling; entropy when absent
    pub seed: Option<u64>,
    /// Number of rounds in a classic game
    pub round_count: usize,
    /// Attempts per slot when sampling the whole sphere
    pub sphere_attempts: u32,
    /// Attempts per slot when sampling shapes or a point list
    pub targeted_attempts: u32,
    /// Imagery lookup radius in meters outside point-list mode
    pub lookup_radius_meters: f64,
    /// Bounding-box rejection attempts per shape sample
    pub max_shape_sampling_attempts: u64,
}

impl GenerationConfig {
    /// Creates the default configuration with a fixed seed.
    ///
    /// # Examples
    ///
    /// ```
    /// use roundgen::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(12345);
    /// assert_eq!(config.seed, Some(12345));
    /// assert_eq!(config.round_count, 5);
    /// assert!(config.targeted_attempts > config.sphere_attempts);
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Creates a configuration for tests: seeded, with a small shape sampling cap.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            max_shape_sampling_attempts: 100_000,
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: &Path) -> RoundgenResult<Self> {
        let config: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can produce a game.
    pub fn validate(&self) -> RoundgenResult<()> {
        if self.round_count == 0 {
            return Err(RoundgenError::InvalidRequest(
                "round count must be at least 1".to_string(),
            ));
        }
        if self.sphere_attempts == 0 || self.targeted_attempts == 0 {
            return Err(RoundgenError::InvalidRequest(
                "attempt bounds must be at least 1".to_string(),
            ));
        }
        if !(self.lookup_radius_meters.is_finite() && self.lookup_radius_meters > 0.0) {
            return Err(RoundgenError::InvalidRequest(format!(
                "lookup radius must be positive, got {}",
                self.lookup_radius_meters
            )));
        }
        if self.max_shape_sampling_attempts == 0 {
            return Err(RoundgenError::InvalidRequest(
                "shape sampling attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates the random number generator for one run.
    pub fn create_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            round_count: config::DEFAULT_ROUND_COUNT,
            sphere_attempts: config::SPHERE_MODE_ATTEMPTS,
            targeted_attempts: config::TARGETED_MODE_ATTEMPTS,
            lookup_radius_meters: config::DEFAULT_LOOKUP_RADIUS_METERS,
            max_shape_sampling_attempts: config::MAX_SHAPE_SAMPLING_ATTEMPTS,
        }
    }
}

/// Game modes with distinct persisted state shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Fixed number of rounds, one location each
    Classic,
    /// One starting location per participant
    Rendezvous,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Classic => write!(f, "classic"),
            GameMode::Rendezvous => write!(f, "rendezvous"),
        }
    }
}

impl FromStr for GameMode {
    type Err = RoundgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(GameMode::Classic),
            "rendezvous" => Ok(GameMode::Rendezvous),
            other => Err(RoundgenError::InvalidRequest(format!(
                "unknown game mode {:?}",
                other
            ))),
        }
    }
}

/// Inputs to one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub mode: GameMode,
    /// Shapes to sample from; empty means the whole sphere
    #[serde(default)]
    pub shape_names: Vec<String>,
    /// Raw `[lng, lat]` candidates; when non-empty they take precedence over shapes
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
    /// Participant ids, rendezvous only
    #[serde(default)]
    pub participants: Vec<String>,
    /// Imagery lookup radius for point-list candidates, meters
    #[serde(default)]
    pub precision_meters: Option<f64>,
}

impl GenerationRequest {
    /// A classic game over the whole sphere.
    pub fn classic() -> Self {
        Self {
            mode: GameMode::Classic,
            shape_names: Vec::new(),
            points: Vec::new(),
            participants: Vec::new(),
            precision_meters: None,
        }
    }

    /// A rendezvous game for the given participants.
    pub fn rendezvous<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: GameMode::Rendezvous,
            participants: participants.into_iter().map(Into::into).collect(),
            ..Self::classic()
        }
    }

    pub fn with_shapes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shape_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_points(mut self, points: Vec<[f64; 2]>) -> Self {
        self.points = points;
        self
    }

    pub fn with_precision(mut self, meters: f64) -> Self {
        self.precision_meters = Some(meters);
        self
    }

    /// Participants with duplicates removed, first occurrence kept.
    pub fn unique_participants(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.participants
            .iter()
            .filter(|p| seen.insert(p.as_str()))
            .cloned()
            .collect()
    }

    /// Checks the request is internally consistent.
    pub fn validate(&self) -> RoundgenResult<()> {
        if self.mode == GameMode::Rendezvous && self.participants.is_empty() {
            return Err(RoundgenError::InvalidRequest(
                "rendezvous needs at least one participant".to_string(),
            ));
        }
        if let Some(meters) = self.precision_meters {
            if !(meters.is_finite() && meters > 0.0) {
                return Err(RoundgenError::InvalidRequest(format!(
                    "precision must be positive, got {}",
                    meters
                )));
            }
        }
        if let Some(bad) = self
            .points
            .iter()
            .find(|p| !(p[0].is_finite() && p[1].is_finite()))
        {
            return Err(RoundgenError::InvalidRequest(format!(
                "invalid point {:?}",
                bad
            )));
        }
        Ok(())
    }
}

/// One classic round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub map_position: LatLng,
}

/// Classic mode output: round index to round, keys `0..N-1`.
pub type RoundSet = BTreeMap<usize, Round>;

/// Per-participant rendezvous data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub map_position: LatLng,
    pub position_history: Vec<LatLng>,
}

impl PlayerData {
    /// Starting data: the history holds just the initial position.
    pub fn starting_at(position: LatLng) -> Self {
        Self {
            map_position: position,
            position_history: vec![position],
        }
    }
}

/// Rendezvous mode output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendezvousState {
    pub player_data: BTreeMap<String, PlayerData>,
    pub finished: bool,
}

/// The complete result of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    Rounds(RoundSet),
    Rendezvous(RendezvousState),
}

impl GenerationOutput {
    /// Child of the room path the output is written to.
    pub fn target_child(&self) -> &'static str {
        match self {
            GenerationOutput::Rounds(_) => "rounds",
            GenerationOutput::Rendezvous(_) => "rendezvous_data",
        }
    }

    /// Serialized form as stored in shared state.
    pub fn to_value(&self) -> RoundgenResult<Value> {
        Ok(match self {
            GenerationOutput::Rounds(rounds) => serde_json::to_value(rounds)?,
            GenerationOutput::Rendezvous(state) => serde_json::to_value(state)?,
        })
    }

    /// Every confirmed position in slot order.
    pub fn positions(&self) -> Vec<LatLng> {
        match self {
            GenerationOutput::Rounds(rounds) => rounds.values().map(|r| r.map_position).collect(),
            GenerationOutput::Rendezvous(state) => state
                .player_data
                .values()
                .map(|p| p.map_position)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generation_config_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.seed, None);
        assert_eq!(config.round_count, 5);
        assert_eq!(config.sphere_attempts, 30);
        assert_eq!(config.targeted_attempts, 60);
        assert_eq!(config.lookup_radius_meters, 40_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generation_config_partial_json() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"round_count": 3, "seed": 9}"#).unwrap();
        assert_eq!(config.round_count, 3);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.targeted_attempts, 60);
    }

    #[test]
    fn test_generation_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"round_count": 0}"#).unwrap();
        assert!(matches!(
            GenerationConfig::from_file(&path),
            Err(RoundgenError::InvalidRequest(_))
        ));

        std::fs::write(&path, r#"{"lookup_radius_meters": 500.0}"#).unwrap();
        let config = GenerationConfig::from_file(&path).unwrap();
        assert_eq!(config.lookup_radius_meters, 500.0);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let config = GenerationConfig::new(77);
        let a: u64 = config.create_rng().gen();
        let b: u64 = config.create_rng().gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_game_mode_parsing() {
        assert_eq!("classic".parse::<GameMode>().unwrap(), GameMode::Classic);
        assert_eq!("Rendezvous".parse::<GameMode>().unwrap(), GameMode::Rendezvous);
        assert!("battle".parse::<GameMode>().is_err());
        assert_eq!(serde_json::to_value(GameMode::Rendezvous).unwrap(), json!("rendezvous"));
    }

    #[test]
    fn test_request_validation() {
        assert!(GenerationRequest::classic().validate().is_ok());
        assert!(GenerationRequest::rendezvous(Vec::<String>::new())
            .validate()
            .is_err());
        assert!(GenerationRequest::classic()
            .with_precision(-5.0)
            .validate()
            .is_err());
        assert!(GenerationRequest::classic()
            .with_points(vec![[f64::NAN, 0.0]])
            .validate()
            .is_err());
    }

    #[test]
    fn test_unique_participants_keeps_order() {
        let request = GenerationRequest::rendezvous(["b", "a", "b", "c"]);
        assert_eq!(request.unique_participants(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_round_set_layout() {
        let mut rounds = RoundSet::new();
        rounds.insert(0, Round { map_position: LatLng::new(1.0, 2.0) });
        rounds.insert(1, Round { map_position: LatLng::new(3.0, 4.0) });
        let output = GenerationOutput::Rounds(rounds);
        assert_eq!(output.target_child(), "rounds");
        assert_eq!(
            output.to_value().unwrap(),
            json!({
                "0": {"map_position": {"lat": 1.0, "lng": 2.0}},
                "1": {"map_position": {"lat": 3.0, "lng": 4.0}}
            })
        );
    }

    #[test]
    fn test_rendezvous_layout() {
        let mut player_data = BTreeMap::new();
        player_data.insert(
            "uid1".to_string(),
            PlayerData::starting_at(LatLng::new(5.0, 6.0)),
        );
        let output = GenerationOutput::Rendezvous(RendezvousState {
            player_data,
            finished: false,
        });
        assert_eq!(output.target_child(), "rendezvous_data");
        assert_eq!(
            output.to_value().unwrap(),
            json!({
                "player_data": {
                    "uid1": {
                        "map_position": {"lat": 5.0, "lng": 6.0},
                        "position_history": [{"lat": 5.0, "lng": 6.0}]
                    }
                },
                "finished": false
            })
        );
    }
}
