//! Heuristic scores over one cycle's records.
//!
//! Every score except the volume anomaly is clamped to [-1, 1]. The anomaly
//! is a plain z-score and feeds the `headline_risk` raw feature when the
//! records carry no anomaly of their own.

use serde::{Deserialize, Serialize};

use crate::constants::{FLOW_SCALE, MIN_ANOMALY_SAMPLES, OPEN_INTEREST_SCALE};
use crate::inputs::{Flow, FlowDirection};
use crate::rolling::RollingStats;

/// Series a signal pass reads. Volumes and prices are oldest first.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalInputs<'a> {
    pub volumes: &'a [f64],
    pub flows: &'a [Flow],
    pub prices: &'a [f64],
    pub open_interest: f64,
    pub funding_rates: &'a [f64],
    pub long_short_ratios: &'a [f64],
    pub depth_imbalance: f64,
    pub spoofing_score: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub anomaly_z: f64,
    pub accumulation_score: f64,
    pub flow_pressure: f64,
    pub leverage_regime: f64,
    pub manipulation_score: f64,
    pub composite: f64,
}

fn clamp_unit(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Z-score of the newest volume against the whole series. Zero with fewer
/// than five samples; a flat series scores against a unit std.
pub fn volume_anomaly(volumes: &[f64]) -> f64 {
    let Some(&latest) = volumes.last() else {
        return 0.0;
    };
    if volumes.len() < MIN_ANOMALY_SAMPLES {
        return 0.0;
    }
    let mut stats = RollingStats::new(volumes.len());
    for v in volumes {
        stats.push(*v);
    }
    let std = match stats.std() {
        s if s == 0.0 => 1.0,
        s => s,
    };
    (latest - stats.mean()) / std
}

/// Price change over the window, discounted by the total scaled flow volume.
pub fn accumulation_distribution(flows: &[Flow], prices: &[f64]) -> f64 {
    let (Some(first), Some(last)) = (prices.first(), prices.last()) else {
        return 0.0;
    };
    if flows.is_empty() {
        return 0.0;
    }
    let flow_volume: f64 = flows.iter().map(|f| f.volume).sum();
    clamp_unit(last - first - flow_volume * FLOW_SCALE)
}

/// Signed, scaled net flow.
pub fn flow_pressure(flows: &[Flow]) -> f64 {
    let net: f64 = flows
        .iter()
        .map(|f| match f.direction {
            FlowDirection::Inflow => f.volume,
            FlowDirection::Outflow => -f.volume,
        })
        .sum();
    clamp_unit(net * FLOW_SCALE)
}

/// `tanh` of scaled open interest plus mean funding plus the mean long/short
/// excess over 1. Zero without positive open interest.
pub fn leverage_regime(open_interest: f64, funding_rates: &[f64], long_short_ratios: &[f64]) -> f64 {
    if open_interest <= 0.0 {
        return 0.0;
    }
    let funding = mean_or_zero(funding_rates);
    let skew = if long_short_ratios.is_empty() {
        0.0
    } else {
        mean_or_zero(long_short_ratios) - 1.0
    };
    (open_interest * OPEN_INTEREST_SCALE + funding + skew).tanh()
}

pub fn manipulation_heuristic(depth_imbalance: f64, spoofing_score: f64) -> f64 {
    clamp_unit(0.6 * depth_imbalance + 0.4 * spoofing_score)
}

/// Equal-weight blend of the five component scores.
pub fn composite_score(
    anomaly_z: f64,
    accumulation: f64,
    flow_pressure: f64,
    leverage: f64,
    manipulation: f64,
) -> f64 {
    clamp_unit(0.2 * (anomaly_z + accumulation + flow_pressure + leverage + manipulation))
}

pub fn build_signals(inputs: &SignalInputs<'_>) -> SignalResult {
    let anomaly_z = volume_anomaly(inputs.volumes);
    let accumulation_score = accumulation_distribution(inputs.flows, inputs.prices);
    let pressure = flow_pressure(inputs.flows);
    let leverage = leverage_regime(
        inputs.open_interest,
        inputs.funding_rates,
        inputs.long_short_ratios,
    );
    let manipulation_score = manipulation_heuristic(inputs.depth_imbalance, inputs.spoofing_score);
    SignalResult {
        anomaly_z,
        accumulation_score,
        flow_pressure: pressure,
        leverage_regime: leverage,
        manipulation_score,
        composite: composite_score(
            anomaly_z,
            accumulation_score,
            pressure,
            leverage,
            manipulation_score,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flow(direction: FlowDirection, volume: f64) -> Flow {
        Flow { direction, volume }
    }

    #[test]
    fn test_volume_anomaly_needs_five_samples() {
        assert_eq!(volume_anomaly(&[]), 0.0);
        assert_eq!(volume_anomaly(&[1.0, 2.0, 3.0, 400.0]), 0.0);
    }

    #[test]
    fn test_volume_anomaly_scores_latest() {
        let volumes = [100.0, 120.0, 130.0, 125.0, 140.0, 150.0];
        // mean 127.5, population variance 1487.5 / 6
        let expected = 22.5 / (1487.5f64 / 6.0).sqrt();
        assert_relative_eq!(volume_anomaly(&volumes), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_volumes_have_zero_anomaly() {
        assert_eq!(volume_anomaly(&[0.7; 8]), 0.0);
    }

    #[test]
    fn test_accumulation_discounts_flow_volume() {
        let flows = [flow(FlowDirection::Inflow, 100_000.0)];
        assert_relative_eq!(
            accumulation_distribution(&flows, &[0.5, 0.51, 0.515, 0.52]),
            0.02 - 0.1,
            epsilon = 1e-12
        );
        // one price has no change; outflows still count toward volume
        let flows = [flow(FlowDirection::Outflow, 300_000.0)];
        assert_relative_eq!(accumulation_distribution(&flows, &[0.5]), -0.3, epsilon = 1e-12);
        assert_eq!(accumulation_distribution(&[], &[0.5, 0.6]), 0.0);
        assert_eq!(accumulation_distribution(&flows, &[]), 0.0);
    }

    #[test]
    fn test_flow_pressure_is_signed_and_clamped() {
        let flows = [
            flow(FlowDirection::Inflow, 400_000.0),
            flow(FlowDirection::Outflow, 150_000.0),
        ];
        assert_relative_eq!(flow_pressure(&flows), 0.25, epsilon = 1e-12);
        assert_eq!(flow_pressure(&[flow(FlowDirection::Outflow, 5e6)]), -1.0);
        assert_eq!(flow_pressure(&[]), 0.0);
    }

    #[test]
    fn test_leverage_regime() {
        assert_eq!(leverage_regime(0.0, &[0.1], &[2.0]), 0.0);
        assert_eq!(leverage_regime(-5.0, &[], &[]), 0.0);
        assert_relative_eq!(leverage_regime(1e8, &[], &[]), 1.0f64.tanh(), epsilon = 1e-12);
        assert_relative_eq!(
            leverage_regime(1e6, &[0.0001, 0.0002], &[1.05, 1.02]),
            (0.01 + 0.00015 + 0.035f64).tanh(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_manipulation_heuristic() {
        assert_relative_eq!(manipulation_heuristic(0.1, 0.2), 0.14, epsilon = 1e-12);
        assert_eq!(manipulation_heuristic(2.0, 2.0), 1.0);
        assert_eq!(manipulation_heuristic(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_build_signals_composite() {
        let flows = [flow(FlowDirection::Inflow, 100_000.0)];
        let result = build_signals(&SignalInputs {
            volumes: &[100.0, 120.0, 130.0, 125.0, 140.0, 150.0],
            flows: &flows,
            prices: &[0.5, 0.51, 0.515, 0.52],
            open_interest: 1_000_000.0,
            funding_rates: &[0.0001, 0.0002],
            long_short_ratios: &[1.05, 1.02],
            depth_imbalance: 0.1,
            spoofing_score: 0.2,
        });

        assert_relative_eq!(result.flow_pressure, 0.1, epsilon = 1e-12);
        assert_relative_eq!(result.manipulation_score, 0.14, epsilon = 1e-12);
        let sum = result.anomaly_z
            + result.accumulation_score
            + result.flow_pressure
            + result.leverage_regime
            + result.manipulation_score;
        assert_relative_eq!(result.composite, 0.2 * sum, epsilon = 1e-12);
        assert!((-1.0..=1.0).contains(&result.composite));
    }

    #[test]
    fn test_composite_is_clamped() {
        assert_eq!(composite_score(9.0, 1.0, 1.0, 1.0, 1.0), 1.0);
        assert_eq!(composite_score(-9.0, -1.0, 0.0, 0.0, 0.0), -1.0);
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(build_signals(&SignalInputs::default()), SignalResult::default());
    }
}
