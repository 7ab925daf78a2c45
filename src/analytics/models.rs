//! Graph analytics data models.
//!
//! ## Output types
//! - [`CentralityProfile`] — per-node centrality scores for one layer
//! - [`ComponentInfo`] — metadata about a connected component
//! - [`MetricsResult`] — all profiles of a layer plus algorithm diagnostics
//! - [`GraphSummary`] — aggregate statistics of a layer
//! - [`Community`] / [`CommunityPartition`] — Louvain output
//!
//! ## Configuration
//! - [`MetricConfig`] — PageRank and betweenness parameters
//! - [`CommunityConfig`] — Louvain parameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::RunWarning;
use crate::network::Layer;

// ============================================================================
// Centrality
// ============================================================================

/// Centrality scores for a single node in a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CentralityProfile {
    /// Degree centrality, raw degree / (n − 1) (0.0–1.0)
    pub degree: f64,
    /// Number of distinct neighbors
    pub raw_degree: usize,
    /// Sum of incident edge weights
    pub strength: f64,
    /// Normalized betweenness over the giant component (0.0–1.0)
    pub betweenness: f64,
    /// Closeness within the node's own component (0.0–1.0)
    pub closeness: f64,
    /// Weighted PageRank (sums to 1 over the layer)
    pub pagerank: f64,
    /// Local clustering coefficient (0.0–1.0)
    pub clustering_coefficient: f64,
    /// Connected component ID
    pub component_id: u32,
    /// True when the node lies outside the giant component
    pub disconnected: bool,
}

/// Metadata about a connected component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub id: u32,
    pub size: usize,
    /// Member IDs, ascending
    pub members: Vec<String>,
    /// Whether this is the giant (largest) component
    pub is_giant: bool,
}

/// Per-node metrics of one layer with algorithm diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResult {
    pub layer: Layer,
    /// Profiles keyed by node ID
    pub profiles: BTreeMap<String, CentralityProfile>,
    /// Components, giant first
    pub components: Vec<ComponentInfo>,
    pub pagerank_converged: bool,
    pub pagerank_iterations: usize,
    /// True when betweenness was estimated from sampled sources
    pub betweenness_approximate: bool,
    pub warnings: Vec<RunWarning>,
}

impl MetricsResult {
    pub fn profile(&self, id: &str) -> Option<&CentralityProfile> {
        self.profiles.get(id)
    }

    pub fn is_approximate(&self) -> bool {
        self.betweenness_approximate || !self.pagerank_converged
    }
}

/// Aggregate statistics of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    /// Mean shortest-path length within the giant component
    pub avg_path_length: Option<f64>,
    /// Longest shortest path within the giant component
    pub diameter: Option<usize>,
    /// Newman modularity of the supplied partition
    pub modularity: Option<f64>,
    /// Degree assortativity (Pearson); `None` when undefined
    pub assortativity: Option<f64>,
    pub average_clustering: f64,
    /// Global clustering: 3 × triangles / connected triples
    pub transitivity: f64,
    pub component_count: usize,
    pub giant_component_size: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub degree_std: f64,
    pub is_connected: bool,
    /// True when path statistics were computed from sampled sources
    pub approximate: bool,
}

// ============================================================================
// Communities
// ============================================================================

/// A Louvain community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: u32,
    pub size: usize,
    /// Member IDs, ascending
    pub members: Vec<String>,
    /// Total weight of edges with both ends inside the community
    pub internal_weight: f64,
}

/// Full partition of a layer's node set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CommunityPartition {
    /// Node ID → community ID
    pub assignments: BTreeMap<String, u32>,
    /// Communities ordered by ID
    pub communities: Vec<Community>,
    /// Newman modularity on the original graph
    pub modularity: f64,
    /// Louvain passes performed
    pub passes: usize,
}

impl CommunityPartition {
    pub fn community_of(&self, id: &str) -> Option<u32> {
        self.assignments.get(id).copied()
    }

    pub fn members(&self, community_id: u32) -> &[String] {
        self.communities
            .get(community_id as usize)
            .map(|c| c.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Tuning parameters for the centrality algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// PageRank damping factor (default: 0.85)
    pub pagerank_damping: f64,
    /// PageRank convergence tolerance, L1 (default: 1e-6)
    pub pagerank_tolerance: f64,
    /// PageRank maximum iterations (default: 100)
    pub pagerank_max_iterations: usize,
    /// Largest giant component for exact betweenness and path statistics (default: 5000)
    pub max_exact_betweenness_nodes: usize,
    /// Sources sampled when the exact bound is exceeded (default: 256)
    pub betweenness_sample_size: usize,
    /// Seed for source sampling (default: 42)
    pub seed: u64,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            pagerank_damping: 0.85,
            pagerank_tolerance: 1e-6,
            pagerank_max_iterations: 100,
            max_exact_betweenness_nodes: 5000,
            betweenness_sample_size: 256,
            seed: 42,
        }
    }
}

/// Tuning parameters for Louvain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    /// Resolution parameter (default: 1.0, higher = smaller communities)
    pub resolution: f64,
    /// Maximum move + aggregate passes (default: 20)
    pub max_passes: usize,
    /// Maximum local-move sweeps per pass (default: 100)
    pub max_sweeps: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            max_passes: 20,
            max_sweeps: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_config_defaults() {
        let config = MetricConfig::default();
        assert!((config.pagerank_damping - 0.85).abs() < f64::EPSILON);
        assert!((config.pagerank_tolerance - 1e-6).abs() < f64::EPSILON);
        assert_eq!(config.pagerank_max_iterations, 100);
    }

    #[test]
    fn test_community_config_partial_yaml() {
        let config: CommunityConfig = serde_yaml::from_str("resolution: 0.5").unwrap();
        assert!((config.resolution - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.max_passes, 20);
    }

    #[test]
    fn test_partition_members_lookup() {
        let partition = CommunityPartition {
            assignments: [("a".to_string(), 0), ("b".to_string(), 0)].into_iter().collect(),
            communities: vec![Community {
                id: 0,
                size: 2,
                members: vec!["a".into(), "b".into()],
                internal_weight: 1.0,
            }],
            modularity: 0.0,
            passes: 1,
        };
        assert_eq!(partition.community_of("b"), Some(0));
        assert_eq!(partition.members(0).len(), 2);
        assert!(partition.members(7).is_empty());
    }
}
