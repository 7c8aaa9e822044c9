//! State construction: raw features → normalized features → composite axes
//! → fixed-length state vector.
//!
//! Feature engineering is deliberately transparent. Every vector has exactly
//! `N_FEATURES` entries: the normalized vocabulary in `RAW_FEATURE_KEYS` order
//! followed by the composite axes in `COMPOSITE_AXIS_KEYS` order. Any path that
//! accepts a vector from outside goes through `validate_vector`.

use serde::{Deserialize, Serialize};

use crate::constants::{N_FEATURES, N_RAW_FEATURES};
use crate::error::{CoreError, Result};
use crate::features::{COMPOSITE_AXIS_KEYS, COMPOSITE_LINKS, FeatureMap, RAW_FEATURE_KEYS};
use crate::rolling::Baselines;

/// Fixed-shape state vector.
pub type StateVector = [f64; N_FEATURES];

/// A single market state snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MarketStateWire")]
pub struct MarketState {
    #[serde(with = "crate::time::iso8601")]
    pub timestamp: i64,
    pub raw_features: FeatureMap,
    pub normalized_features: FeatureMap,
    pub composite_axes: FeatureMap,
    pub vector: StateVector,
}

/// Serialized shape with an unchecked vector, validated on conversion.
#[derive(Deserialize)]
struct MarketStateWire {
    #[serde(with = "crate::time::iso8601")]
    timestamp: i64,
    #[serde(default)]
    raw_features: FeatureMap,
    #[serde(default)]
    normalized_features: FeatureMap,
    #[serde(default)]
    composite_axes: FeatureMap,
    vector: Vec<f64>,
}

impl TryFrom<MarketStateWire> for MarketState {
    type Error = CoreError;

    fn try_from(wire: MarketStateWire) -> Result<Self> {
        Ok(Self {
            timestamp: wire.timestamp,
            raw_features: wire.raw_features,
            normalized_features: wire.normalized_features,
            composite_axes: wire.composite_axes,
            vector: validate_vector(&wire.vector)?,
        })
    }
}

impl MarketState {
    /// Restore a state from a stored vector. Normalized features and composite
    /// axes are read back from their vector positions; raw features are lost.
    pub fn from_vector(timestamp: i64, values: &[f64]) -> Result<Self> {
        let vector = validate_vector(values)?;
        let normalized_features = RAW_FEATURE_KEYS
            .iter()
            .zip(&vector[..N_RAW_FEATURES])
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let composite_axes = COMPOSITE_AXIS_KEYS
            .iter()
            .zip(&vector[N_RAW_FEATURES..])
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        Ok(Self {
            timestamp,
            raw_features: FeatureMap::new(),
            normalized_features,
            composite_axes,
            vector,
        })
    }

    /// Parse a serialized state, failing with `DimensionMismatch` on a
    /// wrong-length vector.
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: MarketStateWire = serde_json::from_str(json)?;
        wire.try_into()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds market states, optionally against rolling baselines.
#[derive(Clone, Debug, Default)]
pub struct StateBuilder {
    baselines: Option<Baselines>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baselines(baselines: Baselines) -> Self {
        Self {
            baselines: Some(baselines),
        }
    }

    pub fn baselines(&self) -> Option<&Baselines> {
        self.baselines.as_ref()
    }

    pub fn build(&self, timestamp: i64, raw: &FeatureMap) -> MarketState {
        let raw_features: FeatureMap = RAW_FEATURE_KEYS
            .iter()
            .map(|k| (k.to_string(), raw.get(*k).copied().unwrap_or(0.0)))
            .collect();
        let normalized_features = normalize(&raw_features, self.baselines.as_ref());
        let composite_axes = composite_axes(&normalized_features);
        let vector = build_vector(&normalized_features, &composite_axes);
        MarketState {
            timestamp,
            raw_features,
            normalized_features,
            composite_axes,
            vector,
        }
    }
}

fn zscore(value: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    (value - mean) / std
}

/// Z-score every vocabulary feature. Unknown keys are ignored, missing keys
/// read as 0.
///
/// Without a baseline for a feature the value is scored against itself
/// (`mean = value`, `std = |value|` or 1), which always yields 0: callers with
/// no history get a neutral signal.
pub fn normalize(raw: &FeatureMap, rolling: Option<&Baselines>) -> FeatureMap {
    RAW_FEATURE_KEYS
        .iter()
        .map(|name| {
            let value = raw.get(*name).copied().unwrap_or(0.0);
            let (mean, std) = rolling
                .and_then(|stats| stats.get(*name).copied())
                .unwrap_or((value, if value != 0.0 { value.abs() } else { 1.0 }));
            (name.to_string(), zscore(value, mean, std))
        })
        .collect()
}

/// Mean of each composite axis's driver features.
pub fn composite_axes(normalized: &FeatureMap) -> FeatureMap {
    COMPOSITE_LINKS
        .iter()
        .map(|(axis, drivers)| {
            let sum: f64 = drivers
                .iter()
                .map(|d| normalized.get(*d).copied().unwrap_or(0.0))
                .sum();
            (axis.to_string(), sum / drivers.len() as f64)
        })
        .collect()
}

/// Concatenate normalized features and composite axes in fixed key order.
pub fn build_vector(normalized: &FeatureMap, composite: &FeatureMap) -> StateVector {
    let mut vector = [0.0; N_FEATURES];
    let normalized_values = RAW_FEATURE_KEYS.iter().map(|k| normalized.get(*k));
    let composite_values = COMPOSITE_AXIS_KEYS.iter().map(|k| composite.get(*k));
    for (slot, value) in vector
        .iter_mut()
        .zip(normalized_values.chain(composite_values))
    {
        *slot = value.copied().unwrap_or(0.0);
    }
    vector
}

/// Accept a pre-built vector only if it has exactly `N_FEATURES` entries.
pub fn validate_vector(values: &[f64]) -> Result<StateVector> {
    values
        .try_into()
        .map_err(|_| CoreError::DimensionMismatch {
            expected: N_FEATURES,
            actual: values.len(),
        })
}
