//! Derivation of the raw feature mapping from recent market records.
//!
//! Fetching those records is a collaborator's job; this module only turns
//! what was fetched into the 14-key vocabulary. Features with no source yet
//! (concentration, rotation, funding, basis, imbalance) are emitted as 0.

use serde::{Deserialize, Serialize};

use crate::features::{FeatureMap, RAW_FEATURE_KEYS};
use crate::signals::{SignalInputs, SignalResult, build_signals, volume_anomaly};

/// Number of recent candle volumes used for realized volatility.
const VOLUME_WINDOW: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Inflow,
    Outflow,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub direction: FlowDirection,
    pub volume: f64,
}

/// Everything a polling cycle gathered from its collaborators.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MarketRecords {
    /// Newest first.
    #[serde(default)]
    pub candles: Vec<Candle>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    /// Stored anomaly score, used as headline risk. Without one the volume
    /// anomaly of the candles is used instead.
    #[serde(default)]
    pub anomaly: Option<f64>,
    #[serde(default)]
    pub headline_count: usize,
    #[serde(default)]
    pub funding_rates: Vec<f64>,
    #[serde(default)]
    pub long_short_ratios: Vec<f64>,
    #[serde(default)]
    pub depth_imbalance: f64,
    #[serde(default)]
    pub spoofing_score: f64,
}

impl MarketRecords {
    fn volumes_oldest_first(&self) -> Vec<f64> {
        self.candles.iter().rev().map(|c| c.volume).collect()
    }

    /// Heuristic signal scores over these records.
    pub fn signals(&self) -> SignalResult {
        let volumes = self.volumes_oldest_first();
        let prices: Vec<f64> = self.candles.iter().rev().map(|c| c.close).collect();
        build_signals(&SignalInputs {
            volumes: &volumes,
            flows: &self.flows,
            prices: &prices,
            open_interest: self.open_interest.unwrap_or(0.0),
            funding_rates: &self.funding_rates,
            long_short_ratios: &self.long_short_ratios,
            depth_imbalance: self.depth_imbalance,
            spoofing_score: self.spoofing_score,
        })
    }

    pub fn raw_inputs(&self) -> FeatureMap {
        let price = self.candles.first().map_or(0.0, |c| c.close);
        let prev_price = self.candles.get(1).map_or(price, |c| c.close);
        let returns = if prev_price != 0.0 {
            (price - prev_price) / prev_price
        } else {
            0.0
        };

        let volumes: Vec<f64> = self
            .candles
            .iter()
            .take(VOLUME_WINDOW)
            .map(|c| c.volume)
            .collect();

        let net_flow: f64 = self
            .flows
            .iter()
            .map(|f| match f.direction {
                FlowDirection::Inflow => f.volume,
                FlowDirection::Outflow => -f.volume,
            })
            .sum();

        let headline_count = self.headline_count as f64;
        let headline_risk = self
            .anomaly
            .unwrap_or_else(|| volume_anomaly(&self.volumes_oldest_first()));

        let mut raw: FeatureMap = RAW_FEATURE_KEYS
            .iter()
            .map(|k| (k.to_string(), 0.0))
            .collect();
        let mut set = |key: &str, value: f64| {
            raw.insert(key.to_string(), value);
        };
        set("spot_price", price);
        set("returns", returns);
        set("realized_vol", population_std(&volumes));
        set("net_flow", net_flow);
        set("open_interest", self.open_interest.unwrap_or(0.0));
        set("aggressive_volume", volumes.first().copied().unwrap_or(0.0));
        set("headline_risk", headline_risk);
        set("headline_count", headline_count);
        set(
            "headline_recency",
            if self.headline_count > 0 { 1.0 } else { 0.0 },
        );
        raw
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
