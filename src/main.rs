//! # Roundgen Command Line
//!
//! Generates the rounds of a room into a JSON state file, or converts a GeoJSON
//! feature collection into the shape layout the generator reads.

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use roundgen::shapes::{convert_file, source_for_location, ConvertOptions};
use roundgen::{
    config, GameMode, GenerationConfig, GenerationRequest, JsonFileStore, RoundgenError,
    RoundgenResult, SessionController, StreetViewOracle,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Command line arguments for roundgen.
#[derive(Parser, Debug)]
#[command(name = "roundgen")]
#[command(about = "Generates playable rounds for a street-imagery geography game")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate rounds or rendezvous positions for a room
    Generate(GenerateArgs),
    /// Convert a GeoJSON FeatureCollection into shape documents
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Path of the room inside the state document, e.g. rooms/abc
    #[arg(long)]
    room: String,

    /// JSON file holding the persisted state
    #[arg(long)]
    store: PathBuf,

    /// Game mode
    #[arg(long, default_value_t = GameMode::Classic)]
    mode: GameMode,

    /// Shape to sample from; may be repeated
    #[arg(long = "shape")]
    shapes: Vec<String>,

    /// JSON file with an array of [lng, lat] candidate points
    #[arg(long)]
    points: Option<PathBuf>,

    /// Rendezvous participant id; may be repeated
    #[arg(long = "participant")]
    participants: Vec<String>,

    /// Lookup radius in meters for point-list candidates
    #[arg(long)]
    precision: Option<f64>,

    /// Directory or http(s) URL holding index.json and the shape documents
    #[arg(long, env = config::LOCATIONS_DIR_ENV)]
    locations: Option<String>,

    /// Imagery API key
    #[arg(long, env = config::STREETVIEW_API_KEY_ENV, hide_env_values = true)]
    api_key: String,

    /// Random seed for reproducible sampling
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON generation config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// GeoJSON FeatureCollection to convert
    input: PathBuf,

    /// Directory the shape documents are written to
    out_dir: PathBuf,

    /// Existing index.json to append the new shapes to
    #[arg(long)]
    index_file: PathBuf,

    /// Value of the `type` property on every shape, e.g. Country
    #[arg(long = "type")]
    type_name: String,

    /// Input property holding the shape name
    #[arg(long, default_value = "name")]
    name_property: String,

    /// Prefix placed before each file name in the index
    #[arg(long, default_value = "")]
    outputs_prefix: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logging(&cli.log_level);

    info!("Starting roundgen v{}", roundgen::VERSION);

    let result = match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Convert(args) => run_convert(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn initialize_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_target(false);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

async fn run_generate(args: GenerateArgs) -> RoundgenResult<()> {
    let mut config = match &args.config {
        Some(path) => GenerationConfig::from_file(path)?,
        None => GenerationConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let mut request = match args.mode {
        GameMode::Classic => GenerationRequest::classic(),
        GameMode::Rendezvous => GenerationRequest::rendezvous(args.participants),
    }
    .with_shapes(args.shapes);
    if let Some(path) = &args.points {
        request = request.with_points(read_points(path)?);
    }
    if let Some(precision) = args.precision {
        request = request.with_precision(precision);
    }

    let needs_shapes = request.points.is_empty() && !request.shape_names.is_empty();
    let location = match (args.locations, needs_shapes) {
        (Some(location), _) => location,
        (None, false) => ".".to_string(),
        (None, true) => {
            return Err(RoundgenError::InvalidRequest(format!(
                "shapes requested but no shape location given (--locations or {})",
                config::LOCATIONS_DIR_ENV
            )))
        }
    };

    let source = source_for_location(&location)?;
    let oracle = Arc::new(StreetViewOracle::new(args.api_key));
    let store = Arc::new(JsonFileStore::new(&args.store));
    let mut session = SessionController::new(source, oracle, store, config);

    if needs_shapes {
        let count = session.load_shape_index().await?;
        info!("Loaded {} shapes from {}", count, location);
        let known = session.shape_cache().shape_names();
        for name in request.shape_names.iter().filter(|n| !known.contains(*n)) {
            warn!("Shape {:?} is not in the index; known shapes: {:?}", name, known);
        }
    }

    session.trigger_regeneration(&args.room, request)?;
    if let Some(output) = session.wait_for_generation().await? {
        info!(
            "Wrote {} positions to {}/{}",
            output.positions().len(),
            args.room,
            output.target_child()
        );
        println!("{}", serde_json::to_string_pretty(&output.to_value()?)?);
    }
    Ok(())
}

fn read_points(path: &Path) -> RoundgenResult<Vec<[f64; 2]>> {
    let points: Vec<[f64; 2]> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(points)
}

fn run_convert(args: ConvertArgs) -> RoundgenResult<()> {
    let options = ConvertOptions {
        name_property: args.name_property,
        type_name: args.type_name,
        outputs_prefix: args.outputs_prefix,
    };
    let count = convert_file(&args.input, &args.out_dir, &args.index_file, &options)?;
    println!("Converted {} shapes", count);
    Ok(())
}
