//! Rolling (mean, std) baselines for z-score normalization.

use std::collections::{BTreeMap, VecDeque};

use crate::features::{FeatureMap, RAW_FEATURE_KEYS};

/// Per-feature `(mean, std)` baseline consumed by `state::normalize`.
pub type Baselines = BTreeMap<String, (f64, f64)>;

/// Fixed-window accumulator over a single feature.
#[derive(Debug, Clone)]
pub struct RollingStats {
    window: usize,
    buf: VecDeque<f64>,
}

impl RollingStats {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buf: VecDeque::new(),
        }
    }

    pub fn push(&mut self, x: f64) {
        self.buf.push_back(x);
        if self.buf.len() > self.window {
            self.buf.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.welford().0
    }

    /// Population standard deviation. A constant window is exactly 0.
    pub fn std(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        let (_, m2) = self.welford();
        (m2 / self.buf.len() as f64).sqrt()
    }

    /// Welford pass over the window: (mean, sum of squared deviations).
    fn welford(&self) -> (f64, f64) {
        let mut mean = 0.0_f64;
        let mut m2 = 0.0_f64;
        for (i, &x) in self.buf.iter().enumerate() {
            let delta = x - mean;
            mean += delta / (i + 1) as f64;
            m2 += delta * (x - mean);
        }
        (mean, m2)
    }
}

/// Build baselines for every vocabulary feature over the most recent `window`
/// raw-input snapshots (oldest first). Features never seen are omitted, so
/// `normalize` falls back to its degenerate self-baseline for them.
pub fn rolling_baselines(history: &[FeatureMap], window: usize) -> Baselines {
    let mut stats: BTreeMap<&str, RollingStats> = BTreeMap::new();
    for snapshot in history {
        for name in RAW_FEATURE_KEYS {
            if let Some(value) = snapshot.get(name) {
                stats
                    .entry(name)
                    .or_insert_with(|| RollingStats::new(window))
                    .push(*value);
            }
        }
    }

    stats
        .into_iter()
        .map(|(name, s)| (name.to_string(), (s.mean(), s.std())))
        .collect()
}
