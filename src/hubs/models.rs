//! Hub classification data models.
//!
//! - [`HubLabel`] — the six hub roles
//! - [`NodeFeatures`] — per-author values the rules read
//! - [`HubRecord`] / [`HubReport`] — classifier output
//! - [`HubConfig`] — eligibility and rule thresholds

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Hub role. A node may carry any number of labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HubLabel {
    StructuralHub,
    InformationBroker,
    CognitiveInfluencer,
    ResonanceLeader,
    CrisisSpecialist,
    CommunityCoordinator,
}

impl std::fmt::Display for HubLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StructuralHub => write!(f, "StructuralHub"),
            Self::InformationBroker => write!(f, "InformationBroker"),
            Self::CognitiveInfluencer => write!(f, "CognitiveInfluencer"),
            Self::ResonanceLeader => write!(f, "ResonanceLeader"),
            Self::CrisisSpecialist => write!(f, "CrisisSpecialist"),
            Self::CommunityCoordinator => write!(f, "CommunityCoordinator"),
        }
    }
}

/// Everything the hub rules know about one eligible author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeFeatures {
    pub post_count: usize,
    pub degree: f64,
    pub raw_degree: usize,
    pub betweenness: f64,
    pub closeness: f64,
    pub pagerank: f64,
    pub community_id: Option<u32>,
    /// Distinct communities in the ego network (node plus neighbors)
    pub ego_communities: usize,
    /// Mean per-post sum of emotion categories
    pub emotional_intensity: f64,
    /// Mean composite Resonance of the author's scored posts
    pub resonance: Option<f64>,
    /// Share of posts containing a crisis keyword
    pub crisis_share: f64,
}

/// One row of the hub table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubRecord {
    pub node: String,
    pub labels: BTreeSet<HubLabel>,
    #[serde(flatten)]
    pub features: NodeFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNode {
    pub node: String,
    pub value: f64,
}

/// Top-K lists by single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HubRankings {
    /// By degree centrality
    pub high_degree: Vec<RankedNode>,
    /// By betweenness
    pub information_brokers: Vec<RankedNode>,
    /// By closeness
    pub quick_spreaders: Vec<RankedNode>,
    /// By PageRank
    pub influence_leaders: Vec<RankedNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HubReport {
    /// One record per eligible node, ascending by node ID
    pub records: Vec<HubRecord>,
    pub rankings: HubRankings,
    /// Nodes below `min_post_count`
    pub ineligible: usize,
}

impl HubReport {
    pub fn labels_of(&self, node: &str) -> BTreeSet<HubLabel> {
        self.records
            .iter()
            .find(|r| r.node == node)
            .map(|r| r.labels.clone())
            .unwrap_or_default()
    }

    pub fn with_label(&self, label: HubLabel) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.labels.contains(&label))
            .map(|r| r.node.as_str())
            .collect()
    }

    pub fn label_counts(&self) -> BTreeMap<HubLabel, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            for label in &record.labels {
                *counts.entry(*label).or_insert(0) += 1;
            }
        }
        counts
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Authors with fewer posts are excluded from every rule (default: 1)
    pub min_post_count: usize,
    /// Share of the eligible population counted as the top decile (default: 0.1)
    pub top_fraction: f64,
    /// Crisis-keyword post share a specialist must exceed (default: 0.5)
    pub crisis_specialist_ratio: f64,
    /// Communities an information broker's ego network must span (default: 2)
    pub min_ego_communities: usize,
    /// Linguistic categories summed into emotional intensity
    pub emotion_categories: Vec<String>,
    /// Length of each ranking list (default: 10)
    pub top_k: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            min_post_count: 1,
            top_fraction: 0.1,
            crisis_specialist_ratio: 0.5,
            min_ego_communities: 2,
            emotion_categories: ["affect", "posemo", "negemo", "anx", "anger", "sad"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            top_k: 10,
        }
    }
}
