//! Market state geometry and swarm consensus engine.
//!
//! Turns one polling cycle of raw market telemetry into an 18-dimensional
//! state vector, projects it onto a principal basis fitted from recent
//! history, and lets a small swarm of linear agents vote per horizon. The
//! swarm score is then blended toward a support value drawn from a fixed
//! feature connectome and the distance of the point from the basis origin.
//!
//! Zero I/O. Callers own polling, storage and publishing.

pub mod agent;
pub mod backtest;
pub mod config;
pub mod connectome;
pub mod constants;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod geometry;
pub mod inputs;
pub mod pipeline;
pub mod predictor;
pub mod rolling;
pub mod signals;
pub mod state;
pub mod time;

pub use agent::{AgentConfig, SwarmAgent, SwarmVote};
pub use backtest::{SwarmPerformance, compute_hit_rate, evaluate_swarm};
pub use config::PipelineConfig;
pub use connectome::ConnectomeGraph;
pub use constants::{HORIZONS, N_COMPOSITE_AXES, N_FEATURES, N_RAW_FEATURES};
pub use ensemble::{HorizonMetrics, Smoothing, SwarmEnsemble, SwarmSnapshot};
pub use error::{CoreError, Result};
pub use features::{COMPOSITE_AXIS_KEYS, FeatureMap, RAW_FEATURE_KEYS};
pub use geometry::{GeometryProjector, GeometrySnapshot, Motif};
pub use inputs::MarketRecords;
pub use pipeline::{CycleReport, Pipeline};
pub use predictor::SwarmPredictor;
pub use rolling::{Baselines, RollingStats, rolling_baselines};
pub use signals::{SignalInputs, SignalResult, build_signals};
pub use state::{MarketState, StateBuilder, StateVector};
