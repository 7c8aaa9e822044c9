//! Integration tests exercising the full cycle:
//! raw features → state → geometry → swarm forecast, across module boundaries.

use approx::assert_relative_eq;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sf_core::agent::{AgentConfig, SwarmAgent};
use sf_core::inputs::{Candle, Flow, FlowDirection};
use sf_core::{
    ConnectomeGraph, CoreError, FeatureMap, GeometryProjector, GeometrySnapshot, MarketRecords,
    MarketState, Motif, N_FEATURES, Pipeline, PipelineConfig, RAW_FEATURE_KEYS, StateBuilder,
    StateVector, SwarmEnsemble, SwarmPredictor, rolling_baselines,
};

fn rng() -> SmallRng {
    SmallRng::seed_from_u64(42)
}

fn raw(pairs: &[(&str, f64)]) -> FeatureMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Random-walk histories of raw feature maps.
fn random_raw_history(rng: &mut SmallRng, len: usize) -> Vec<FeatureMap> {
    let mut level: Vec<f64> = RAW_FEATURE_KEYS.iter().map(|_| 0.0).collect();
    (0..len)
        .map(|_| {
            for l in level.iter_mut() {
                *l += rng.random_range(-1.0..1.0);
            }
            RAW_FEATURE_KEYS
                .iter()
                .zip(&level)
                .map(|(k, v)| (k.to_string(), *v))
                .collect()
        })
        .collect()
}

fn random_vectors(rng: &mut SmallRng, len: usize) -> Vec<StateVector> {
    (0..len)
        .map(|_| {
            let mut v = [0.0; N_FEATURES];
            for x in v.iter_mut() {
                *x = rng.random_range(-2.0..2.0);
            }
            v
        })
        .collect()
}

/// Without baselines the vector is all zeros, but lookups fall through to the
/// raw values, so the default roster still votes on the raw magnitudes and the
/// connectome support saturates.
#[test]
fn cold_start_end_to_end() {
    let state = StateBuilder::new().build(
        1_700_000_000,
        &raw(&[("net_flow", 250_000.0), ("open_interest", 3_000_000.0)]),
    );
    assert_eq!(state.vector, [0.0; N_FEATURES]);
    assert_eq!(state.raw_features.len(), RAW_FEATURE_KEYS.len());
    assert_eq!(state.raw_features["net_flow"], 250_000.0);

    let projector = GeometryProjector::default();
    let geometry = projector.snapshot(&state.vector);
    assert_eq!(geometry, GeometrySnapshot::empty(2));

    let mut predictor = PipelineConfig::default().predictor().unwrap();
    let swarm = predictor.forecast(&state, None, geometry.motif_id);

    // flow_plus_price reads raw net_flow, leverage_balance raw open_interest
    let names: Vec<&str> = swarm.agent_breakdown.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["flow_plus_price", "leverage_balance"]);
    assert_eq!(
        swarm.per_horizon.keys().map(String::as_str).collect::<Vec<_>>(),
        ["1h", "5m"]
    );
    assert!(!swarm.per_horizon.contains_key("4h"));

    let five = &swarm.per_horizon["5m"];
    assert_eq!(five.total_votes, 1);
    assert_relative_eq!(five.up_strength, 100_000.0, epsilon = 1e-6);
    let hour = &swarm.per_horizon["1h"];
    assert_eq!(hour.total_votes, 1);
    assert_relative_eq!(hour.up_strength, 1_499_999.95, epsilon = 1e-6);

    let messages = predictor.connectome().messages(&state);
    let mean = messages.values().sum::<f64>() / messages.len() as f64;
    assert_relative_eq!(mean, 71_500.0, epsilon = 1e-6);

    let support = swarm.connectome_support.unwrap();
    assert_eq!(support.geometry_bias, 0.0);
    assert_relative_eq!(support.support_score, mean.tanh());
    for metrics in swarm.per_horizon.values() {
        assert_relative_eq!(metrics.swarm_score, 1.0);
        assert_relative_eq!(metrics.persistence, 0.3);
        assert_eq!(metrics.connectome_support, Some(support.support_score));
    }
}

/// An all-zero raw map leaves every lookup at 0: nothing votes and there is
/// nothing for the connectome to carry.
#[test]
fn cold_start_zero_inputs_are_silent() {
    let zeros: FeatureMap = RAW_FEATURE_KEYS.iter().map(|k| (k.to_string(), 0.0)).collect();
    for input in [zeros, FeatureMap::new()] {
        let state = StateBuilder::new().build(1_700_000_000, &input);
        assert_eq!(state.vector, [0.0; N_FEATURES]);

        let mut predictor = PipelineConfig::default().predictor().unwrap();
        let swarm = predictor.forecast(&state, None, None);
        assert!(swarm.per_horizon.is_empty());
        assert!(swarm.agent_breakdown.is_empty());
        assert!(predictor.ensemble().persistence().is_empty());
        let support = swarm.connectome_support.unwrap();
        assert_eq!(support.support_score, 0.0);
        assert_eq!(support.geometry_bias, 0.0);
    }
}

/// Opposed agents on one horizon cancel; a lone agent on another scores ±1.
#[test]
fn agents_aggregate_per_horizon() {
    let mut vector = [0.0; N_FEATURES];
    vector[3] = 1.0; // net_flow
    vector[1] = -1.0; // returns
    let state = MarketState::from_vector(0, &vector).unwrap();

    let agents = vec![
        // 0.75 - 0.25 = 0.5, exactly at the threshold
        AgentConfig::new("edge", &["net_flow", "returns"], "5m", "direction", &[0.75, 0.25])
            .threshold(0.5),
        AgentConfig::new("bear", &["returns"], "5m", "direction", &[0.5]).threshold(0.5),
        AgentConfig::new("tail", &["net_flow"], "4h", "tail_event", &[-1.0])
            .labels("EVENT_YES", "EVENT_NO"),
        AgentConfig::new("quiet", &["realized_vol"], "1h", "direction", &[1.0]),
    ]
    .into_iter()
    .map(|c| SwarmAgent::new(c).unwrap())
    .collect();

    let mut ensemble = SwarmEnsemble::new(agents);
    let snap = ensemble.predict(&state, None);

    let five = &snap.per_horizon["5m"];
    assert_eq!(five.total_votes, 2);
    assert_eq!(five.up_strength, 0.5);
    assert_eq!(five.down_strength, 0.5);
    assert_eq!(five.swarm_score, 0.0);

    let four = &snap.per_horizon["4h"];
    assert_eq!(four.down_strength, 1.0);
    assert_eq!(four.swarm_score, -1.0);

    assert!(!snap.per_horizon.contains_key("1h"));
    let names: Vec<&str> = snap.agent_breakdown.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["edge", "bear", "tail"]);
}

/// Persistence climbs toward a constant swarm score across forecasts while
/// the reported swarm score is blended afresh each cycle.
#[test]
fn persistence_across_forecasts() {
    let bull = SwarmAgent::new(
        AgentConfig::new("bull", &["spot_price"], "1h", "direction", &[0.0]).intercept(1.0),
    )
    .unwrap();
    let mut predictor =
        SwarmPredictor::new(ConnectomeGraph::default(), SwarmEnsemble::new(vec![bull]));
    let state = MarketState::from_vector(0, &[0.0; N_FEATURES]).unwrap();

    let expected = [0.3, 0.51, 0.657, 0.7599];
    for p in expected {
        let snap = predictor.forecast(&state, None, None);
        let m = &snap.per_horizon["1h"];
        assert_eq!(m.swarm_score, 0.421875);
        assert_relative_eq!(m.persistence, p, epsilon = 1e-12);
    }
}

/// Fitting the same history twice gives identical projections, and the
/// snapshot feeds the forecaster's geometry bias.
#[test]
fn fitted_geometry_is_deterministic() {
    let mut rng = rng();
    let history = random_vectors(&mut rng, 64);
    let point = random_vectors(&mut rng, 1)[0];

    let mut a = GeometryProjector::default();
    let mut b = GeometryProjector::default();
    a.fit(&history);
    b.fit(&history);
    let snap_a = a.snapshot(&point);
    let snap_b = b.snapshot(&point);
    assert_eq!(snap_a, snap_b);
    assert_eq!(snap_a.coords.len(), 2);
    assert!(snap_a.motif_id.is_some());
    assert_eq!(snap_a.motif_transition_probs.len(), 3);

    let bias = SwarmPredictor::geometry_bias(Some(&snap_a.coords));
    let radius = snap_a.coords.iter().map(|c| c * c).sum::<f64>().sqrt();
    assert_relative_eq!(bias, radius.tanh());
}

/// A short or malformed history never fails the cycle.
#[test]
fn unfitted_geometry_degrades() {
    let mut rng = rng();
    let mut history: Vec<Vec<f64>> = random_vectors(&mut rng, 9)
        .into_iter()
        .map(|v| v.to_vec())
        .collect();
    history.push(vec![1.0; 7]);

    let mut projector = GeometryProjector::default();
    projector.fit(&history);
    assert!(!projector.is_fitted());
    assert_eq!(projector.snapshot(&history[0]), GeometrySnapshot::empty(2));
    assert_eq!(projector.transform(&history[0]).unwrap(), vec![0.0, 0.0]);
    assert!(matches!(
        projector.transform(&[0.0; 5]),
        Err(CoreError::DimensionMismatch {
            expected: 18,
            actual: 5
        })
    ));
}

/// Serialized states restore with their features read back from the vector
/// positions; a short vector is rejected with the dimension error.
#[test]
fn state_json_restore() {
    let mut rng = rng();
    let history = random_raw_history(&mut rng, 30);
    let baselines = rolling_baselines(&history, 24);
    let state = StateBuilder::with_baselines(baselines).build(1_700_000_000, &history[29]);

    let json = state.to_json().unwrap();
    assert!(json.contains("\"timestamp\":\"2023-11-14T22:13:20Z\""));
    let restored = MarketState::from_json(&json).unwrap();
    assert_eq!(restored, state);

    let from_vector = MarketState::from_vector(state.timestamp, &state.vector).unwrap();
    assert_eq!(from_vector.normalized_features, state.normalized_features);
    assert_eq!(from_vector.composite_axes, state.composite_axes);

    let short = r#"{"timestamp":"2024-01-01T00:00:00Z","vector":[0.0,1.0,2.0]}"#;
    assert_eq!(
        MarketState::from_json(short).unwrap_err(),
        CoreError::DimensionMismatch {
            expected: 18,
            actual: 3
        }
    );
}

/// Records flow through raw-input derivation into a running pipeline that
/// warms up, fits, and starts publishing motifs.
#[test]
fn records_through_pipeline() {
    let mut rng = rng();
    let config = PipelineConfig::default();
    let mut pipeline = Pipeline::new(&config).unwrap();

    let mut price = 40_000.0;
    let mut last = None;
    for t in 0..40i64 {
        let candles: Vec<Candle> = (0..3)
            .map(|_| {
                price *= 1.0 + rng.random_range(-0.01..0.01);
                Candle {
                    open: price,
                    high: price * 1.002,
                    low: price * 0.998,
                    close: price,
                    volume: rng.random_range(10.0..100.0),
                }
            })
            .collect();
        let records = MarketRecords {
            candles,
            flows: vec![
                Flow {
                    direction: FlowDirection::Inflow,
                    volume: rng.random_range(0.0..500.0),
                },
                Flow {
                    direction: FlowDirection::Outflow,
                    volume: rng.random_range(0.0..500.0),
                },
            ],
            open_interest: Some(1e9 + rng.random_range(-1e7..1e7)),
            anomaly: Some(rng.random_range(0.0..1.0)),
            headline_count: rng.random_range(0..5),
            ..Default::default()
        };
        let report = pipeline.step(1_700_000_000 + 300 * t, &records.raw_inputs());
        if t <= config.min_history as i64 {
            // history holds only prior cycles, so the first fit happens at
            // cycle min_history
            assert_eq!(report.geometry.motif_id.is_some(), t == config.min_history as i64);
        }
        last = Some(report);
    }

    let report = last.unwrap();
    assert_eq!(pipeline.history_len(), 40);
    assert!(report.geometry.motif_id.is_some());
    let support = report.swarm.connectome_support.unwrap();
    assert_relative_eq!(
        support.geometry_bias,
        SwarmPredictor::geometry_bias(Some(&report.geometry.coords))
    );
    let value = serde_json::to_value(&report).unwrap();
    assert!(value["geometry"]["motif_id"].is_string());
    assert!(
        [
            Motif::CalmLeverageBuild,
            Motif::GrindingSqueeze,
            Motif::PanicUnwind,
            Motif::NeutralBalance,
        ]
        .iter()
        .any(|m| value["geometry"]["motif_id"] == m.as_str())
    );
}
