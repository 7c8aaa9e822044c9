//! Offline scoring of past swarm snapshots against realized returns.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ensemble::SwarmSnapshot;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwarmPerformance {
    pub horizon: String,
    pub hit_rate: f64,
    pub average_payoff: f64,
}

/// -1, 0 or 1. Zero and NaN both read as 0.
fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Share of pairs whose signs agree, over the shorter of the two series.
/// A zero only matches a zero.
pub fn compute_hit_rate(predictions: &[f64], outcomes: &[f64]) -> f64 {
    let n = predictions.len().min(outcomes.len());
    if n == 0 {
        return 0.0;
    }
    let hits = predictions
        .iter()
        .zip(outcomes)
        .filter(|(p, o)| sign(**p) == sign(**o))
        .count();
    hits as f64 / n as f64
}

fn average_payoff(predictions: &[f64], outcomes: &[f64]) -> f64 {
    let n = predictions.len().min(outcomes.len());
    if n == 0 {
        return 0.0;
    }
    predictions
        .iter()
        .zip(outcomes)
        .map(|(p, o)| p * o)
        .sum::<f64>()
        / n as f64
}

/// One entry per horizon of the newest snapshot, in horizon order. Each
/// snapshot contributes its blended swarm score for that horizon, or 0 when
/// the horizon had no votes that cycle. `realized_returns[i]` is the outcome
/// that followed `snapshots[i]`.
pub fn evaluate_swarm(
    snapshots: &[SwarmSnapshot],
    realized_returns: &[f64],
) -> Vec<SwarmPerformance> {
    let Some(latest) = snapshots.last() else {
        return Vec::new();
    };
    if realized_returns.is_empty() {
        return Vec::new();
    }

    let performance: Vec<SwarmPerformance> = latest
        .per_horizon
        .keys()
        .map(|horizon| {
            let predictions: Vec<f64> = snapshots
                .iter()
                .map(|s| s.per_horizon.get(horizon).map_or(0.0, |m| m.swarm_score))
                .collect();
            SwarmPerformance {
                horizon: horizon.clone(),
                hit_rate: compute_hit_rate(&predictions, realized_returns),
                average_payoff: average_payoff(&predictions, realized_returns),
            }
        })
        .collect();
    debug!(
        snapshots = snapshots.len(),
        returns = realized_returns.len(),
        horizons = performance.len(),
        "swarm backtest evaluated"
    );
    performance
}
