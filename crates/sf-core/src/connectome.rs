//! Fixed feature connectome and one-hop message passing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::CONNECTOME_WEIGHT;
use crate::features::{COMPOSITE_LINKS, FeatureMap, RAW_FEATURE_KEYS, lookup_feature};
use crate::state::MarketState;

/// Neighbor name → edge weight.
pub type Neighborhood = BTreeMap<String, f64>;

static NO_NEIGHBORS: Neighborhood = BTreeMap::new();

/// Static weighted graph coupling composite axes to the raw features that
/// define them. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectomeGraph {
    adjacency: BTreeMap<String, Neighborhood>,
}

impl Default for ConnectomeGraph {
    /// Every vocabulary feature is a node; each composite axis is wired both
    /// ways to its drivers with weight 0.33.
    fn default() -> Self {
        let mut adjacency: BTreeMap<String, Neighborhood> = RAW_FEATURE_KEYS
            .iter()
            .map(|k| (k.to_string(), Neighborhood::new()))
            .collect();

        for (axis, drivers) in COMPOSITE_LINKS {
            for driver in drivers {
                adjacency
                    .entry(axis.to_string())
                    .or_default()
                    .insert(driver.to_string(), CONNECTOME_WEIGHT);
                adjacency
                    .entry(driver.to_string())
                    .or_default()
                    .insert(axis.to_string(), CONNECTOME_WEIGHT);
            }
        }
        Self { adjacency }
    }
}

impl ConnectomeGraph {
    pub fn from_adjacency(adjacency: BTreeMap<String, Neighborhood>) -> Self {
        Self { adjacency }
    }

    pub fn adjacency(&self) -> &BTreeMap<String, Neighborhood> {
        &self.adjacency
    }

    /// Outgoing edges of `node`; empty for unknown nodes.
    pub fn neighborhood(&self, node: &str) -> &Neighborhood {
        self.adjacency.get(node).unwrap_or(&NO_NEIGHBORS)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum()
    }

    /// One hop of propagation: every node's value times each edge weight,
    /// summed at the receiving neighbor.
    pub fn messages(&self, state: &MarketState) -> FeatureMap {
        let mut messages = FeatureMap::new();
        for (node, neighbors) in &self.adjacency {
            if neighbors.is_empty() {
                continue;
            }
            let value = lookup_feature(
                &state.normalized_features,
                &state.composite_axes,
                &state.raw_features,
                node,
            );
            for (neighbor, weight) in neighbors {
                *messages.entry(neighbor.clone()).or_insert(0.0) += value * weight;
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::N_FEATURES;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_wiring() {
        let graph = ConnectomeGraph::default();
        assert_eq!(graph.neighborhood("flow_axis").len(), 3);
        assert_eq!(graph.neighborhood("pressure_axis").len(), 2);
        assert_eq!(graph.neighborhood("net_flow")["flow_axis"], 0.33);
        assert_eq!(graph.neighborhood("flow_axis")["net_flow"], 0.33);
        // 11 drivers, each linked both ways
        assert_eq!(graph.edge_count(), 22);
    }

    #[test]
    fn test_unlinked_and_unknown_nodes() {
        let graph = ConnectomeGraph::default();
        assert!(graph.adjacency().contains_key("spot_price"));
        assert!(graph.neighborhood("spot_price").is_empty());
        assert!(graph.neighborhood("moon_phase").is_empty());
    }

    #[test]
    fn test_messages_accumulate() {
        let mut vector = [0.0; N_FEATURES];
        vector[3] = 1.0; // net_flow
        vector[4] = 2.0; // exchange_concentration
        vector[14] = 0.5; // flow_axis
        let state = MarketState::from_vector(0, &vector).unwrap();

        let messages = ConnectomeGraph::default().messages(&state);
        assert_eq!(messages.len(), 15);
        assert_relative_eq!(messages["flow_axis"], 0.99, epsilon = 1e-12);
        assert_relative_eq!(messages["net_flow"], 0.165, epsilon = 1e-12);
        assert_relative_eq!(messages["leverage_axis"], 0.0);
    }

    #[test]
    fn test_messages_are_pure() {
        let state = MarketState::from_vector(0, &[0.2; N_FEATURES]).unwrap();
        let graph = ConnectomeGraph::default();
        assert_eq!(graph.messages(&state), graph.messages(&state));
    }
}
