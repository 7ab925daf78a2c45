//! Network data models.
//!
//! ## Graph types
//! - [`Layer`] — which of the four network layers a graph represents
//! - [`GraphNode`] / [`GraphEdge`] — node and edge payloads
//! - [`LayerGraph`] — petgraph wrapper with ID ↔ NodeIndex mapping
//!
//! ## Configuration
//! - [`NetworkConfig`] — thresholds, windows and bounds for layer construction

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Layer
// ============================================================================

/// One of the four network layers derived from the Post Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Authors linked by replies and shared-subreddit participation
    UserInteraction,
    /// Posts linked by TF-IDF cosine similarity
    ContentSimilarity,
    /// Posts linked by temporal proximity
    TemporalProximity,
    /// Subreddits linked by shared authors
    SubredditCooccurrence,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::UserInteraction,
        Layer::ContentSimilarity,
        Layer::TemporalProximity,
        Layer::SubredditCooccurrence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserInteraction => "user_interaction",
            Self::ContentSimilarity => "content_similarity",
            Self::TemporalProximity => "temporal_proximity",
            Self::SubredditCooccurrence => "subreddit_cooccurrence",
        }
    }

    /// What the nodes of this layer stand for.
    pub fn node_kind(&self) -> NodeKind {
        match self {
            Self::UserInteraction => NodeKind::Author,
            Self::ContentSimilarity | Self::TemporalProximity => NodeKind::Post,
            Self::SubredditCooccurrence => NodeKind::Subreddit,
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Nodes and edges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Author,
    Post,
    Subreddit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Author name, post id or subreddit name depending on the layer
    pub id: String,
    pub kind: NodeKind,
}

/// Collapsed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Interaction count, similarity, or proximity weight depending on the layer
    pub weight: f64,
    /// Number of observations merged into this edge
    pub interactions: u32,
}

impl GraphEdge {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            interactions: 1,
        }
    }
}

// ============================================================================
// LayerGraph — petgraph wrapper with ID mapping
// ============================================================================

/// Undirected simple graph for one layer, with bidirectional ID ↔ NodeIndex mapping.
///
/// Self-loops are never stored and parallel edges are collapsed into one edge
/// whose weight accumulates.
#[derive(Debug, Clone)]
pub struct LayerGraph {
    pub layer: Layer,
    pub graph: UnGraph<GraphNode, GraphEdge>,
    pub id_to_index: HashMap<String, NodeIndex>,
    /// True when a pair bound truncated construction
    pub approximate: bool,
}

impl LayerGraph {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            graph: UnGraph::default(),
            id_to_index: HashMap::new(),
            approximate: false,
        }
    }

    pub fn with_capacity(layer: Layer, nodes: usize, edges: usize) -> Self {
        Self {
            layer,
            graph: UnGraph::with_capacity(nodes, edges),
            id_to_index: HashMap::with_capacity(nodes),
            approximate: false,
        }
    }

    /// Add a node by ID. Returns the existing index if already present.
    pub fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.id_to_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode {
            id: id.to_string(),
            kind: self.layer.node_kind(),
        });
        self.id_to_index.insert(id.to_string(), idx);
        idx
    }

    /// Add `weight` to the edge between two existing nodes, creating it if needed.
    ///
    /// Returns `None` for self-loops, unknown IDs or non-positive weights.
    pub fn add_or_increment_edge(&mut self, a: &str, b: &str, weight: f64) -> Option<EdgeIndex> {
        if a == b || !(weight > 0.0) {
            return None;
        }
        let ia = *self.id_to_index.get(a)?;
        let ib = *self.id_to_index.get(b)?;
        if let Some(edge) = self.graph.find_edge(ia, ib) {
            let payload = &mut self.graph[edge];
            payload.weight += weight;
            payload.interactions += 1;
            return Some(edge);
        }
        Some(self.graph.add_edge(ia, ib, GraphEdge::new(weight)))
    }

    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_to_index.contains_key(id)
    }

    pub fn node_id(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].id
    }

    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f64> {
        let edge = self.graph.find_edge(self.get_index(a)?, self.get_index(b)?)?;
        Some(self.graph[edge].weight)
    }

    /// Neighbors of a node with the connecting edge weight.
    pub fn neighbors(&self, id: &str) -> Vec<(&str, f64)> {
        let Some(idx) = self.get_index(id) else {
            return Vec::new();
        };
        self.graph
            .edges(idx)
            .map(|e| {
                let other = if e.source() == idx { e.target() } else { e.source() };
                (self.node_id(other), e.weight().weight)
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node IDs in ascending order.
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.graph.node_weights().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Tuning parameters for layer construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Minimum distinct authors for the user-interaction layer (default: 2)
    pub min_distinct_authors: usize,
    /// Minimum posts for the content and temporal layers (default: 2)
    pub min_posts: usize,
    /// Minimum subreddits for the subreddit layer (default: 2)
    pub min_subreddits: usize,
    /// Author names treated as placeholders and left out of the user layer
    pub excluded_authors: Vec<String>,
    /// Window for shared-subreddit co-occurrence, in hours (default: 24)
    pub cooccurrence_window_hours: f64,
    /// Cosine similarity a pair must exceed to be linked (default: 0.3)
    pub similarity_threshold: f64,
    /// Terms in more than this share of documents are not used for blocking (default: 0.5)
    pub blocking_max_df_ratio: f64,
    /// Temporal layer window, in hours (default: 24)
    pub time_window_hours: f64,
    /// Only link temporally close posts sharing a subreddit or author (default: false)
    pub require_shared_context: bool,
    /// Upper bound on candidate pairs scored per pairwise layer (default: 2,000,000)
    pub max_pairs_compared: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            min_distinct_authors: 2,
            min_posts: 2,
            min_subreddits: 2,
            excluded_authors: vec!["[deleted]".to_string(), "unknown".to_string()],
            cooccurrence_window_hours: 24.0,
            similarity_threshold: 0.3,
            blocking_max_df_ratio: 0.5,
            time_window_hours: 24.0,
            require_shared_context: false,
            max_pairs_compared: 2_000_000,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
