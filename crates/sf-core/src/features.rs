//! Fixed feature vocabulary and the ordered-fallback feature accessor.

use std::collections::BTreeMap;

use crate::constants::{N_COMPOSITE_AXES, N_RAW_FEATURES};

/// Named real-valued features. Ordered so serialized output is stable.
pub type FeatureMap = BTreeMap<String, f64>;

/// Raw feature vocabulary, in state-vector order.
pub const RAW_FEATURE_KEYS: [&str; N_RAW_FEATURES] = [
    "spot_price",
    "returns",
    "realized_vol",
    "net_flow",
    "exchange_concentration",
    "stablecoin_rotation",
    "open_interest",
    "funding_skew",
    "perp_basis",
    "orderbook_imbalance",
    "aggressive_volume",
    "headline_risk",
    "headline_count",
    "headline_recency",
];

/// Composite axis names, in state-vector order.
pub const COMPOSITE_AXIS_KEYS: [&str; N_COMPOSITE_AXES] = [
    "flow_axis",
    "leverage_axis",
    "pressure_axis",
    "headline_axis",
];

/// Each composite axis paired with the raw features it averages.
pub const COMPOSITE_LINKS: [(&str, &[&str]); N_COMPOSITE_AXES] = [
    (
        "flow_axis",
        &["net_flow", "exchange_concentration", "stablecoin_rotation"],
    ),
    ("leverage_axis", &["open_interest", "funding_skew", "perp_basis"]),
    ("pressure_axis", &["orderbook_imbalance", "aggressive_volume"]),
    (
        "headline_axis",
        &["headline_risk", "headline_count", "headline_recency"],
    ),
];

pub fn is_raw_feature(name: &str) -> bool {
    RAW_FEATURE_KEYS.contains(&name)
}

/// Resolve a feature by name across the three layers of a state.
///
/// Precedence is normalized → composite → raw → 0. A value of exactly zero
/// counts as missing and falls through to the next layer, so a neutral
/// normalized feature reads its raw magnitude instead.
pub fn lookup_feature(
    normalized: &FeatureMap,
    composite: &FeatureMap,
    raw: &FeatureMap,
    name: &str,
) -> f64 {
    [normalized, composite, raw]
        .into_iter()
        .filter_map(|layer| layer.get(name).copied())
        .find(|v| *v != 0.0)
        .unwrap_or(0.0)
}
