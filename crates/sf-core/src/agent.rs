//! Threshold-gated linear voters.

use serde::{Deserialize, Serialize};

use crate::constants::VOTE_THRESHOLD;
use crate::error::{CoreError, Result};
use crate::features::lookup_feature;
use crate::state::MarketState;

/// Labels that count toward the up side when votes are aggregated.
pub const UP_LABELS: [&str; 2] = ["UP", "EVENT_YES"];

fn default_threshold() -> f64 {
    VOTE_THRESHOLD
}

fn default_labels() -> [String; 2] {
    ["UP".to_string(), "DOWN".to_string()]
}

/// Fixed configuration for one agent. Coefficients are not learned online.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub feature_subset: Vec<String>,
    pub horizon: String,
    pub target: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// (non-negative margin, negative margin)
    #[serde(default = "default_labels")]
    pub direction_labels: [String; 2],
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl AgentConfig {
    pub fn new(
        name: &str,
        feature_subset: &[&str],
        horizon: &str,
        target: &str,
        coefficients: &[f64],
    ) -> Self {
        Self {
            name: name.to_string(),
            feature_subset: feature_subset.iter().map(|s| s.to_string()).collect(),
            horizon: horizon.to_string(),
            target: target.to_string(),
            threshold: VOTE_THRESHOLD,
            direction_labels: default_labels(),
            coefficients: coefficients.to_vec(),
            intercept: 0.0,
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn intercept(mut self, intercept: f64) -> Self {
        self.intercept = intercept;
        self
    }

    pub fn labels(mut self, up: &str, down: &str) -> Self {
        self.direction_labels = [up.to_string(), down.to_string()];
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.coefficients.len() != self.feature_subset.len() {
            return Err(CoreError::InvalidConfig(format!(
                "agent '{}' has {} coefficients for {} features",
                self.name,
                self.coefficients.len(),
                self.feature_subset.len()
            )));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "agent '{}' threshold must be a non-negative number, got {}",
                self.name, self.threshold
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(CoreError::InvalidConfig(format!(
                "agent '{}' has non-finite weights",
                self.name
            )));
        }
        Ok(())
    }
}

/// One agent's opinion for one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwarmVote {
    pub direction: String,
    pub strength: f64,
    pub horizon: String,
    pub target: String,
}

impl SwarmVote {
    pub fn is_up(&self) -> bool {
        UP_LABELS.contains(&self.direction.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct SwarmAgent {
    config: AgentConfig,
}

impl SwarmAgent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn feature_vector(&self, state: &MarketState) -> Vec<f64> {
        self.config
            .feature_subset
            .iter()
            .map(|name| {
                lookup_feature(
                    &state.normalized_features,
                    &state.composite_axes,
                    &state.raw_features,
                    name,
                )
            })
            .collect()
    }

    /// `margin = features · coefficients + intercept`. Votes only when
    /// `|margin|` reaches the threshold; the sign picks the label.
    pub fn predict(&self, state: &MarketState) -> Option<SwarmVote> {
        let features = self.feature_vector(state);
        if features.is_empty() {
            return None;
        }
        let margin: f64 = features
            .iter()
            .zip(&self.config.coefficients)
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.config.intercept;
        let strength = margin.abs();
        if strength < self.config.threshold {
            return None;
        }
        let [up, down] = &self.config.direction_labels;
        let direction = if margin >= 0.0 { up } else { down };
        Some(SwarmVote {
            direction: direction.clone(),
            strength,
            horizon: self.config.horizon.clone(),
            target: self.config.target.clone(),
        })
    }
}
