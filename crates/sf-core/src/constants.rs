/// Number of raw features in the fixed vocabulary.
pub const N_RAW_FEATURES: usize = 14;

/// Number of composite axes derived from the normalized features.
pub const N_COMPOSITE_AXES: usize = 4;

/// State vector length: normalized features followed by composite axes.
pub const N_FEATURES: usize = N_RAW_FEATURES + N_COMPOSITE_AXES;

/// Default projection rank.
pub const N_COMPONENTS: usize = 2;

/// Minimum usable history rows before the projector will fit a basis.
pub const MIN_HISTORY: usize = 10;

/// Number of trailing coordinates used for local drift.
pub const DRIFT_WINDOW: usize = 3;

/// Radius below which a projected point is classified as calm.
pub const CALM_RADIUS: f64 = 0.5;

/// Weight carried by every default connectome edge.
pub const CONNECTOME_WEIGHT: f64 = 0.33;

/// Decay applied to the previous persistence value each cycle.
pub const PERSISTENCE_DECAY: f64 = 0.7;

/// Weight of the current cycle's swarm score in persistence.
pub const PERSISTENCE_GAIN: f64 = 0.3;

/// Default number of support-blending rounds.
pub const SUPPORT_ITERATIONS: usize = 3;

/// Default blending factor toward connectome support.
pub const SUPPORT_DAMPING: f64 = 0.25;

/// Default agent confidence threshold.
pub const VOTE_THRESHOLD: f64 = 0.5;

/// Minimum volume samples before a volume anomaly is scored.
pub const MIN_ANOMALY_SAMPLES: usize = 5;

/// Scale applied to flow volumes inside the flow signals.
pub const FLOW_SCALE: f64 = 1e-6;

/// Scale applied to open interest inside the leverage regime.
pub const OPEN_INTEREST_SCALE: f64 = 1e-8;

/// Off-diagonal tolerance for the Jacobi eigensolver.
pub const JACOBI_TOLERANCE: f64 = 1e-14;

/// Sweep cap for the Jacobi eigensolver.
pub const JACOBI_MAX_SWEEPS: usize = 100;

/// Forecast horizon labels, in reporting order.
pub const HORIZONS: [&str; 3] = ["5m", "1h", "4h"];
