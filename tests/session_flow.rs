//! End-to-end session tests against on-disk shapes and a JSON state file

use async_trait::async_trait;
use roundgen::shapes::{convert_file, ConvertOptions};
use roundgen::{
    CandidatePoint, DirShapeSource, GenerationConfig, GenerationOutput, GenerationRequest,
    ImageryOracle, JsonFileStore, LatLng, PersistedStore, RoundSet, RoundgenError, RoundgenResult,
    SessionController, ShapeCache,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Confirms every candidate after a short delay.
#[derive(Default)]
struct SlowEchoOracle {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageryOracle for SlowEchoOracle {
    async fn lookup_nearest_imagery(
        &self,
        point: CandidatePoint,
        _radius_meters: f64,
    ) -> RoundgenResult<Option<LatLng>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(Some(point.to_lat_lng()))
    }
}

fn square(min: f64, max: f64) -> Value {
    json!([[[min, min], [max, min], [max, max], [min, max], [min, min]]])
}

/// Converts two square countries into `dir` and returns the shape directory.
fn publish_shapes(dir: &Path) -> RoundgenResult<std::path::PathBuf> {
    let input = dir.join("countries.geojson");
    let collection = json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "West Land"},
                "geometry": {"type": "Polygon", "coordinates": square(-20.0, -10.0)}
            },
            {
                "type": "Feature",
                "properties": {"name": "East Land"},
                "geometry": {"type": "Polygon", "coordinates": square(30.0, 40.0)}
            }
        ]
    });
    fs::write(&input, collection.to_string())?;

    let shapes_dir = dir.join("shapes");
    fs::create_dir_all(&shapes_dir)?;
    let index = shapes_dir.join("index.json");
    fs::write(&index, "{}")?;

    let count = convert_file(&input, &shapes_dir, &index, &ConvertOptions::new("Country"))?;
    assert_eq!(count, 2);
    Ok(shapes_dir)
}

fn in_square(position: &LatLng, min: f64, max: f64) -> bool {
    (min..=max).contains(&position.lat) && (min..=max).contains(&position.lng)
}

#[tokio::test]
async fn test_generate_from_converted_shapes() -> RoundgenResult<()> {
    let dir = TempDir::new()?;
    let shapes_dir = publish_shapes(dir.path())?;
    let state_file = dir.path().join("state.json");

    let mut session = SessionController::new(
        Arc::new(DirShapeSource::new(&shapes_dir)),
        Arc::new(SlowEchoOracle::default()),
        Arc::new(JsonFileStore::new(&state_file)),
        GenerationConfig::for_testing(99),
    );
    assert_eq!(session.load_shape_index().await?, 2);

    session.trigger_regeneration("rooms/abc", GenerationRequest::classic().with_shapes(["East Land"]))?;
    let output = session.wait_for_generation().await?.expect("active generator");

    for position in output.positions() {
        assert!(in_square(&position, 30.0, 40.0), "{:?}", position);
    }
    assert!(session.shape_cache().get("East Land").is_some());
    assert!(session.shape_cache().get("West Land").is_none());

    let state: Value = serde_json::from_str(&fs::read_to_string(&state_file)?)?;
    let rounds: RoundSet = serde_json::from_value(state["rooms"]["abc"]["rounds"].clone())?;
    assert_eq!(GenerationOutput::Rounds(rounds), output);
    Ok(())
}

#[tokio::test]
async fn test_superseded_generator_never_persists() -> RoundgenResult<()> {
    let dir = TempDir::new()?;
    let shapes_dir = publish_shapes(dir.path())?;
    let state_file = dir.path().join("state.json");
    let store = Arc::new(JsonFileStore::new(&state_file));

    let mut session = SessionController::new(
        Arc::new(DirShapeSource::new(&shapes_dir)),
        Arc::new(SlowEchoOracle::default()),
        store.clone(),
        GenerationConfig::for_testing(5),
    );
    session.load_shape_index().await?;

    let first = session
        .trigger_regeneration("rooms/abc", GenerationRequest::classic().with_shapes(["West Land"]))?;
    tokio::task::yield_now().await;
    let second = session
        .trigger_regeneration("rooms/abc", GenerationRequest::classic().with_shapes(["East Land"]))?;
    assert_ne!(first, second);

    let output = session.wait_for_generation().await?.expect("active generator");
    let persisted = store.get("rooms/abc/rounds").await?.expect("rounds written");
    let rounds: RoundSet = serde_json::from_value(persisted)?;

    assert_eq!(GenerationOutput::Rounds(rounds.clone()), output);
    assert!(rounds.values().all(|r| in_square(&r.map_position, 30.0, 40.0)));
    assert_eq!(session.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_rendezvous_replaces_previous_state() -> RoundgenResult<()> {
    let dir = TempDir::new()?;
    let state_file = dir.path().join("state.json");
    fs::write(
        &state_file,
        json!({"rooms": {"abc": {"rendezvous_data": {"stale": true}, "host": "p1"}}}).to_string(),
    )?;

    let mut session = SessionController::new(
        Arc::new(DirShapeSource::new(dir.path())),
        Arc::new(SlowEchoOracle::default()),
        Arc::new(JsonFileStore::new(&state_file)),
        GenerationConfig::for_testing(8),
    );
    session.trigger_regeneration(
        "rooms/abc",
        GenerationRequest::rendezvous(["p1", "p2"]).with_points(vec![[4.0, 5.0]]),
    )?;
    session.wait_for_generation().await?;

    let state: Value = serde_json::from_str(&fs::read_to_string(&state_file)?)?;
    let room = &state["rooms"]["abc"];
    assert_eq!(room["host"], json!("p1"));
    assert!(room["rendezvous_data"].get("stale").is_none());
    assert_eq!(room["rendezvous_data"]["finished"], json!(false));
    assert_eq!(
        room["rendezvous_data"]["player_data"]["p2"]["map_position"],
        json!({"lat": 5.0, "lng": 4.0})
    );
    Ok(())
}

#[tokio::test]
async fn test_unwritable_store_fails_with_connectivity() -> RoundgenResult<()> {
    let dir = TempDir::new()?;
    let state_file = dir.path().join("missing").join("state.json");

    let mut session = SessionController::new(
        Arc::new(DirShapeSource::new(dir.path())),
        Arc::new(SlowEchoOracle::default()),
        Arc::new(JsonFileStore::new(&state_file)),
        GenerationConfig::for_testing(1),
    );
    session.trigger_regeneration("room", GenerationRequest::classic())?;

    let result = session.wait_for_generation().await;
    assert!(matches!(result, Err(RoundgenError::Connectivity(_))));
    assert!(!state_file.exists());
    Ok(())
}
