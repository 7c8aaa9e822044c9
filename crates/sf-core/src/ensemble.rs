//! Vote aggregation with cross-cycle persistence smoothing.
//!
//! The persistence map is the only memory the engine carries between polling
//! cycles. It is owned by the ensemble and changed only through `predict`,
//! which takes `&mut self`: one writer at a time. Callers that share an
//! ensemble across threads must wrap it in a lock themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::{SwarmAgent, SwarmVote};
use crate::constants::{PERSISTENCE_DECAY, PERSISTENCE_GAIN};
use crate::geometry::Motif;
use crate::state::MarketState;

/// Aggregated votes and scores for one horizon.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonMetrics {
    pub up_strength: f64,
    pub down_strength: f64,
    pub total_votes: usize,
    pub swarm_score: f64,
    pub persistence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectome_support: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBreakdown {
    pub name: String,
    pub horizon: String,
    pub target: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectomeSupport {
    pub support_score: f64,
    pub geometry_bias: f64,
}

/// One cycle's consensus, ready for publishing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    pub per_horizon: BTreeMap<String, HorizonMetrics>,
    pub agent_breakdown: Vec<AgentBreakdown>,
    pub motif_id: Option<Motif>,
    pub connectome_support: Option<ConnectomeSupport>,
}

/// Exponential smoothing weights: `decay * previous + gain * current`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Smoothing {
    pub decay: f64,
    pub gain: f64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            decay: PERSISTENCE_DECAY,
            gain: PERSISTENCE_GAIN,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SwarmEnsemble {
    agents: Vec<SwarmAgent>,
    smoothing: Smoothing,
    persistence: BTreeMap<String, f64>,
}

impl SwarmEnsemble {
    pub fn new(agents: Vec<SwarmAgent>) -> Self {
        Self::with_smoothing(agents, Smoothing::default())
    }

    pub fn with_smoothing(agents: Vec<SwarmAgent>, smoothing: Smoothing) -> Self {
        Self {
            agents,
            smoothing,
            persistence: BTreeMap::new(),
        }
    }

    pub fn agents(&self) -> &[SwarmAgent] {
        &self.agents
    }

    /// Last smoothed score per horizon.
    pub fn persistence(&self) -> &BTreeMap<String, f64> {
        &self.persistence
    }

    /// Seed the smoothing state, e.g. from a previous process's snapshot.
    pub fn restore_persistence(&mut self, persistence: BTreeMap<String, f64>) {
        self.persistence = persistence;
    }

    pub fn predict(&mut self, state: &MarketState, motif_id: Option<Motif>) -> SwarmSnapshot {
        let mut votes: Vec<SwarmVote> = Vec::new();
        let mut agent_breakdown = Vec::new();
        for agent in &self.agents {
            let Some(vote) = agent.predict(state) else {
                continue;
            };
            let config = agent.config();
            agent_breakdown.push(AgentBreakdown {
                name: config.name.clone(),
                horizon: config.horizon.clone(),
                target: config.target.clone(),
            });
            votes.push(vote);
        }

        let per_horizon = self.aggregate(&votes);
        debug!(
            agents = self.agents.len(),
            votes = votes.len(),
            horizons = per_horizon.len(),
            "swarm votes aggregated"
        );

        SwarmSnapshot {
            per_horizon,
            agent_breakdown,
            motif_id,
            connectome_support: None,
        }
    }

    fn aggregate(&mut self, votes: &[SwarmVote]) -> BTreeMap<String, HorizonMetrics> {
        let mut by_horizon: BTreeMap<String, HorizonMetrics> = BTreeMap::new();
        for vote in votes {
            let bucket = by_horizon.entry(vote.horizon.clone()).or_default();
            if vote.is_up() {
                bucket.up_strength += vote.strength;
            } else {
                bucket.down_strength += vote.strength;
            }
            bucket.total_votes += 1;
        }

        for (horizon, metrics) in by_horizon.iter_mut() {
            let total = metrics.up_strength + metrics.down_strength;
            let denom = if total == 0.0 { 1.0 } else { total };
            let raw_score = (metrics.up_strength - metrics.down_strength) / denom;
            let previous = self.persistence.get(horizon).copied().unwrap_or(0.0);
            let persistence = self.smoothing.decay * previous + self.smoothing.gain * raw_score;

            metrics.swarm_score = raw_score;
            metrics.persistence = persistence;
            self.persistence.insert(horizon.clone(), persistence);
        }
        by_horizon
    }
}
