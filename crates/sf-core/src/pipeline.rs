//! One polling cycle, end to end: build the state, refit the projector on
//! prior history, snapshot the geometry, forecast with its coordinates.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::ensemble::SwarmSnapshot;
use crate::error::Result;
use crate::features::FeatureMap;
use crate::geometry::{GeometryProjector, GeometrySnapshot};
use crate::predictor::SwarmPredictor;
use crate::rolling::{Baselines, rolling_baselines};
use crate::state::{MarketState, StateBuilder, StateVector};

/// Everything a cycle produces for publishing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub state: MarketState,
    pub geometry: GeometrySnapshot,
    pub swarm: SwarmSnapshot,
}

pub struct Pipeline {
    projector: GeometryProjector,
    predictor: SwarmPredictor,
    baseline_window: usize,
    history_limit: usize,
    raw_history: VecDeque<FeatureMap>,
    vector_history: VecDeque<StateVector>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            projector: config.projector(),
            predictor: config.predictor()?,
            baseline_window: config.baseline_window,
            history_limit: config.history_limit,
            raw_history: VecDeque::new(),
            vector_history: VecDeque::new(),
        })
    }

    pub fn projector(&self) -> &GeometryProjector {
        &self.projector
    }

    pub fn predictor(&self) -> &SwarmPredictor {
        &self.predictor
    }

    pub fn history_len(&self) -> usize {
        self.vector_history.len()
    }

    /// Run a cycle against caller-supplied baselines and vector history
    /// (oldest first, excluding the current observation).
    pub fn run_cycle<V: AsRef<[f64]>>(
        &mut self,
        timestamp: i64,
        raw: &FeatureMap,
        baselines: Option<&Baselines>,
        history: &[V],
    ) -> CycleReport {
        let builder = match baselines {
            Some(b) => StateBuilder::with_baselines(b.clone()),
            None => StateBuilder::new(),
        };
        let state = builder.build(timestamp, raw);

        self.projector.fit(history);
        let geometry = self.projector.snapshot(&state.vector);
        let coords = self.projector.is_fitted().then_some(geometry.coords.as_slice());
        let swarm = self.predictor.forecast(&state, coords, geometry.motif_id);

        debug!(
            timestamp = %crate::time::unix_to_iso8601(timestamp),
            history = history.len(),
            motif = ?geometry.motif_id,
            "cycle complete"
        );
        CycleReport {
            state,
            geometry,
            swarm,
        }
    }

    /// Run a cycle against the pipeline's own bounded histories, then record
    /// the observation for the next cycle.
    pub fn step(&mut self, timestamp: i64, raw: &FeatureMap) -> CycleReport {
        let raw_history: Vec<FeatureMap> = self.raw_history.iter().cloned().collect();
        let baselines = (!raw_history.is_empty())
            .then(|| rolling_baselines(&raw_history, self.baseline_window));
        let history: Vec<StateVector> = self.vector_history.iter().copied().collect();

        let report = self.run_cycle(timestamp, raw, baselines.as_ref(), &history);

        self.raw_history.push_back(raw.clone());
        while self.raw_history.len() > self.baseline_window {
            self.raw_history.pop_front();
        }
        self.vector_history.push_back(report.state.vector);
        while self.vector_history.len() > self.history_limit {
            self.vector_history.pop_front();
        }
        report
    }
}
