use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use sf_core::features::is_raw_feature;
use sf_core::inputs::{Candle, Flow, FlowDirection};
use sf_core::time::{iso8601_to_unix, now_unix_secs};
use sf_core::{
    FeatureMap, GeometryProjector, GeometrySnapshot, MarketRecords, MarketState, Pipeline,
    PipelineConfig, StateBuilder, SwarmSnapshot, evaluate_swarm, rolling_baselines,
};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "sf", about = "Market state geometry and swarm forecast CLI")]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a market state from raw features
    State {
        /// JSON object of raw feature values
        input: PathBuf,

        /// Treat the input as market records (candles, flows, open interest)
        #[arg(long)]
        records: bool,

        /// JSON array of earlier raw feature objects, oldest first
        #[arg(long)]
        history: Option<PathBuf>,

        /// Observation time (ISO-8601), defaults to now
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Fit the projector on history and snapshot one state
    Geometry {
        /// JSON array of state vectors or serialized states, oldest first
        history: PathBuf,

        /// Serialized market state to project
        state: PathBuf,
    },

    /// Run the swarm forecast for one state
    Forecast {
        /// Serialized market state
        state: PathBuf,

        /// Geometry snapshot supplying coordinates and motif
        #[arg(long)]
        geometry: Option<PathBuf>,

        /// Persistence file, read if present and rewritten after the forecast
        #[arg(long)]
        persistence: Option<PathBuf>,
    },

    /// Drive the full pipeline over synthetic market records
    Simulate {
        /// Number of polling cycles
        #[arg(long, default_value_t = 30)]
        cycles: usize,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// First cycle time (ISO-8601), defaults to now
        #[arg(long)]
        start: Option<String>,

        /// Seconds between cycles
        #[arg(long, default_value_t = 300)]
        interval: i64,
    },

    /// Score heuristic signals for one cycle of market records
    Signals {
        /// JSON market records (candles newest first, flows, open interest)
        records: PathBuf,
    },

    /// Score past forecasts against the returns that followed them
    Backtest {
        /// JSON array of swarm snapshots, oldest first
        snapshots: PathBuf,

        /// JSON array of realized returns, one per snapshot
        returns: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::State {
            input,
            records,
            history,
            timestamp,
        } => cmd_state(
            &config,
            input,
            *records,
            history.as_deref(),
            timestamp.as_deref(),
        ),
        Commands::Geometry { history, state } => cmd_geometry(&config, history, state),
        Commands::Forecast {
            state,
            geometry,
            persistence,
        } => cmd_forecast(&config, state, geometry.as_deref(), persistence.as_deref()),
        Commands::Simulate {
            cycles,
            seed,
            start,
            interval,
        } => cmd_simulate(&config, *cycles, *seed, start.as_deref(), *interval),
        Commands::Signals { records } => cmd_signals(records),
        Commands::Backtest { snapshots, returns } => cmd_backtest(snapshots, returns),
        Commands::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    PipelineConfig::from_toml(&text)
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_state(path: &Path) -> Result<MarketState> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    MarketState::from_json(&text)
        .with_context(|| format!("invalid market state in {}", path.display()))
}

fn parse_timestamp(value: Option<&str>) -> Result<i64> {
    match value {
        Some(s) => iso8601_to_unix(s).with_context(|| format!("invalid timestamp {s:?}")),
        None => Ok(now_unix_secs()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_state(
    config: &PipelineConfig,
    input: &Path,
    records: bool,
    history: Option<&Path>,
    timestamp: Option<&str>,
) -> Result<()> {
    let raw: FeatureMap = if records {
        read_json::<MarketRecords>(input)?.raw_inputs()
    } else {
        read_json(input)?
    };
    for key in raw.keys().filter(|k| !is_raw_feature(k)) {
        warn!("ignoring unknown feature {key:?}");
    }

    let builder = match history {
        Some(path) => {
            let rows: Vec<FeatureMap> = read_json(path)?;
            debug!(rows = rows.len(), "computing rolling baselines");
            StateBuilder::with_baselines(rolling_baselines(&rows, config.baseline_window))
        }
        None => StateBuilder::new(),
    };

    let state = builder.build(parse_timestamp(timestamp)?, &raw);
    print_json(&state)
}

/// Accepts bare vectors or serialized states; anything else is skipped.
fn history_rows(values: Vec<serde_json::Value>) -> Vec<Vec<f64>> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let row = match value {
                serde_json::Value::Object(mut map) => map
                    .remove("vector")
                    .unwrap_or(serde_json::Value::Object(map)),
                other => other,
            };
            match serde_json::from_value::<Vec<f64>>(row) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("skipping history row {i}: {e}");
                    None
                }
            }
        })
        .collect()
}

fn cmd_geometry(config: &PipelineConfig, history: &Path, state: &Path) -> Result<()> {
    let rows = history_rows(read_json(history)?);
    let state = read_state(state)?;

    let mut projector: GeometryProjector = config.projector();
    projector.fit(&rows);
    if !projector.is_fitted() {
        warn!(
            rows = rows.len(),
            required = config.min_history,
            "not enough history to fit, emitting empty geometry"
        );
    }
    print_json(&projector.snapshot(&state.vector))
}

fn cmd_forecast(
    config: &PipelineConfig,
    state: &Path,
    geometry: Option<&Path>,
    persistence: Option<&Path>,
) -> Result<()> {
    let state = read_state(state)?;
    let geometry: Option<GeometrySnapshot> = geometry.map(read_json::<GeometrySnapshot>).transpose()?;

    let mut predictor = config.predictor()?;
    if let Some(path) = persistence
        && path.exists()
    {
        let restored: BTreeMap<String, f64> = read_json(path)?;
        predictor.ensemble_mut().restore_persistence(restored);
    }

    let coords = geometry
        .as_ref()
        .filter(|g| g.motif_id.is_some())
        .map(|g| g.coords.as_slice());
    let motif_id = geometry.as_ref().and_then(|g| g.motif_id);
    let snapshot = predictor.forecast(&state, coords, motif_id);

    if let Some(path) = persistence {
        let json = serde_json::to_string_pretty(predictor.ensemble().persistence())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    print_json(&snapshot)
}

/// One cycle of plausible-looking records around a drifting price.
fn synthetic_records(rng: &mut SmallRng, price: &mut f64) -> MarketRecords {
    let mut candles: Vec<Candle> = (0..5)
        .map(|_| {
            let open = *price;
            *price *= 1.0 + rng.random_range(-0.004..0.004);
            Candle {
                open,
                high: open.max(*price) * 1.001,
                low: open.min(*price) * 0.999,
                close: *price,
                volume: rng.random_range(5.0..150.0),
            }
        })
        .collect();
    candles.reverse();

    let flows = (0..rng.random_range(1..6))
        .map(|_| Flow {
            direction: if rng.random_bool(0.5) {
                FlowDirection::Inflow
            } else {
                FlowDirection::Outflow
            },
            volume: rng.random_range(10.0..2_000.0),
        })
        .collect();

    MarketRecords {
        candles,
        flows,
        open_interest: Some(2.0e9 * (1.0 + rng.random_range(-0.02..0.02))),
        // headline risk falls back to the candles' volume anomaly
        anomaly: None,
        headline_count: rng.random_range(0..8),
        funding_rates: vec![0.0001; 5],
        long_short_ratios: vec![1.05; 5],
        ..Default::default()
    }
}

fn cmd_simulate(
    config: &PipelineConfig,
    cycles: usize,
    seed: u64,
    start: Option<&str>,
    interval: i64,
) -> Result<()> {
    let mut pipeline = Pipeline::new(config)?;
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut price = 60_000.0;
    let start = parse_timestamp(start)?;

    for cycle in 0..cycles {
        let records = synthetic_records(&mut rng, &mut price);
        let timestamp = start + interval * cycle as i64;
        let report = pipeline.step(timestamp, &records.raw_inputs());
        println!("{}", serde_json::to_string(&report)?);
    }
    debug!(cycles, history = pipeline.history_len(), "simulation finished");
    Ok(())
}

fn cmd_signals(records: &Path) -> Result<()> {
    let records: MarketRecords = read_json(records)?;
    print_json(&records.signals())
}

fn cmd_backtest(snapshots: &Path, returns: &Path) -> Result<()> {
    let snapshots: Vec<SwarmSnapshot> = read_json(snapshots)?;
    let returns: Vec<f64> = read_json(returns)?;
    if snapshots.len() != returns.len() {
        warn!(
            snapshots = snapshots.len(),
            returns = returns.len(),
            "series lengths differ, scoring the overlap"
        );
    }
    print_json(&evaluate_swarm(&snapshots, &returns))
}

fn cmd_config(config: &PipelineConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
