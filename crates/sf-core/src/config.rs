//! Pipeline configuration, loadable from TOML.
//!
//! Every field is optional in the file; omitted fields take the defaults
//! below, and an omitted `agents` table takes the default roster.

use serde::{Deserialize, Serialize};

use crate::agent::{AgentConfig, SwarmAgent};
use crate::connectome::ConnectomeGraph;
use crate::constants::{
    DRIFT_WINDOW, MIN_HISTORY, N_COMPONENTS, N_FEATURES, PERSISTENCE_DECAY, PERSISTENCE_GAIN,
    SUPPORT_DAMPING, SUPPORT_ITERATIONS,
};
use crate::ensemble::{Smoothing, SwarmEnsemble};
use crate::error::{CoreError, Result};
use crate::geometry::GeometryProjector;
use crate::predictor::SwarmPredictor;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub n_components: usize,
    pub min_history: usize,
    pub drift_window: usize,
    pub persistence_decay: f64,
    pub persistence_gain: f64,
    pub iterations: usize,
    pub damping: f64,
    /// Raw-input snapshots kept for rolling baselines.
    pub baseline_window: usize,
    /// State vectors kept for fitting the projector.
    pub history_limit: usize,
    pub agents: Vec<AgentConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_components: N_COMPONENTS,
            min_history: MIN_HISTORY,
            drift_window: DRIFT_WINDOW,
            persistence_decay: PERSISTENCE_DECAY,
            persistence_gain: PERSISTENCE_GAIN,
            iterations: SUPPORT_ITERATIONS,
            damping: SUPPORT_DAMPING,
            baseline_window: 288,
            history_limit: 500,
            agents: default_agents(),
        }
    }
}

/// Hand-tuned scouts: one per horizon.
pub fn default_agents() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new(
            "flow_plus_price",
            &["net_flow", "returns", "flow_axis"],
            "5m",
            "direction",
            &[0.4, 0.6, 0.3],
        )
        .threshold(0.2),
        AgentConfig::new(
            "leverage_balance",
            &["open_interest", "leverage_axis"],
            "1h",
            "direction",
            &[0.5, 0.5],
        )
        .threshold(0.15)
        .intercept(-0.05),
        AgentConfig::new(
            "headline_tension",
            &["headline_axis", "realized_vol"],
            "4h",
            "tail_event",
            &[0.7, 0.2],
        )
        .threshold(0.25)
        .labels("EVENT_YES", "EVENT_NO"),
    ]
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=N_FEATURES).contains(&self.n_components) {
            return Err(CoreError::InvalidConfig(format!(
                "n_components must be within 1..={N_FEATURES}, got {}",
                self.n_components
            )));
        }
        unit_interval("damping", self.damping)?;
        unit_interval("persistence_decay", self.persistence_decay)?;
        unit_interval("persistence_gain", self.persistence_gain)?;
        if self.baseline_window == 0 || self.history_limit == 0 {
            return Err(CoreError::InvalidConfig(
                "baseline_window and history_limit must be positive".into(),
            ));
        }
        for agent in &self.agents {
            agent.validate()?;
        }
        Ok(())
    }

    pub fn projector(&self) -> GeometryProjector {
        GeometryProjector::with_params(self.n_components, self.min_history, self.drift_window)
    }

    pub fn ensemble(&self) -> Result<SwarmEnsemble> {
        let agents = self
            .agents
            .iter()
            .cloned()
            .map(SwarmAgent::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(SwarmEnsemble::with_smoothing(
            agents,
            Smoothing {
                decay: self.persistence_decay,
                gain: self.persistence_gain,
            },
        ))
    }

    pub fn predictor(&self) -> Result<SwarmPredictor> {
        Ok(SwarmPredictor::with_blending(
            ConnectomeGraph::default(),
            self.ensemble()?,
            self.iterations,
            self.damping,
        ))
    }
}
