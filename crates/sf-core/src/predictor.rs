//! Geometry-aware connectomic forecaster.
//!
//! Runs the ensemble, then pulls every horizon's swarm score toward a single
//! support value derived from connectome messages and the geometry radius.
//! The blend is applied round by round rather than in closed form so results
//! match bit for bit when `damping` or `iterations` change.

use tracing::debug;

use crate::connectome::ConnectomeGraph;
use crate::constants::{SUPPORT_DAMPING, SUPPORT_ITERATIONS};
use crate::ensemble::{ConnectomeSupport, SwarmEnsemble, SwarmSnapshot};
use crate::geometry::Motif;
use crate::state::MarketState;

#[derive(Clone, Debug)]
pub struct SwarmPredictor {
    connectome: ConnectomeGraph,
    ensemble: SwarmEnsemble,
    iterations: usize,
    damping: f64,
}

impl SwarmPredictor {
    pub fn new(connectome: ConnectomeGraph, ensemble: SwarmEnsemble) -> Self {
        Self::with_blending(connectome, ensemble, SUPPORT_ITERATIONS, SUPPORT_DAMPING)
    }

    pub fn with_blending(
        connectome: ConnectomeGraph,
        ensemble: SwarmEnsemble,
        iterations: usize,
        damping: f64,
    ) -> Self {
        Self {
            connectome,
            ensemble,
            iterations,
            damping,
        }
    }

    pub fn connectome(&self) -> &ConnectomeGraph {
        &self.connectome
    }

    pub fn ensemble(&self) -> &SwarmEnsemble {
        &self.ensemble
    }

    pub fn ensemble_mut(&mut self) -> &mut SwarmEnsemble {
        &mut self.ensemble
    }

    /// `tanh(‖coords‖)`, or 0 without coordinates.
    pub fn geometry_bias(coords: Option<&[f64]>) -> f64 {
        match coords {
            Some(c) if !c.is_empty() => c.iter().map(|x| x * x).sum::<f64>().sqrt().tanh(),
            _ => 0.0,
        }
    }

    pub fn forecast(
        &mut self,
        state: &MarketState,
        coords: Option<&[f64]>,
        motif_id: Option<Motif>,
    ) -> SwarmSnapshot {
        let mut snapshot = self.ensemble.predict(state, motif_id);
        let messages = self.connectome.messages(state);
        let geometry_bias = Self::geometry_bias(coords);

        let support_score = if messages.is_empty() {
            0.0
        } else {
            let mean = messages.values().sum::<f64>() / messages.len() as f64;
            (mean + geometry_bias).tanh()
        };

        for _ in 0..self.iterations {
            for metrics in snapshot.per_horizon.values_mut() {
                metrics.swarm_score =
                    (1.0 - self.damping) * metrics.swarm_score + self.damping * support_score;
                metrics.connectome_support = Some(support_score);
            }
        }

        debug!(support_score, geometry_bias, "connectome support blended");
        snapshot.connectome_support = Some(ConnectomeSupport {
            support_score,
            geometry_bias,
        });
        snapshot
    }
}
