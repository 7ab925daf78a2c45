//! Post Store → layer graphs.
//!
//! Every layer is built independently from the same immutable store. A layer
//! that cannot be built yields an `InsufficientData` error in its slot of the
//! returned map while the remaining layers are still produced.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use super::models::{Layer, LayerGraph, NetworkConfig};
use super::text::{cosine, TfIdfCorpus};
use crate::error::{EngineError, EngineResult};
use crate::posts::PostStore;

/// Per-layer build outcome, keyed by layer.
pub type NetworkLayers = BTreeMap<Layer, EngineResult<LayerGraph>>;

/// Builds the four network layers from a Post Store.
#[derive(Debug, Clone, Default)]
pub struct NetworkBuilder {
    config: NetworkConfig,
}

impl NetworkBuilder {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Build all layers in parallel.
    pub fn build(&self, store: &PostStore) -> NetworkLayers {
        Layer::ALL
            .par_iter()
            .map(|&layer| (layer, self.build_layer(layer, store)))
            .collect::<Vec<_>>()
            .into_iter()
            .inspect(|(layer, result)| match result {
                Ok(g) => tracing::info!(
                    "Built layer={} nodes={} edges={} approximate={}",
                    layer,
                    g.node_count(),
                    g.edge_count(),
                    g.approximate
                ),
                Err(e) => tracing::warn!("Layer {} not built: {}", layer, e),
            })
            .collect()
    }

    pub fn build_layer(&self, layer: Layer, store: &PostStore) -> EngineResult<LayerGraph> {
        match layer {
            Layer::UserInteraction => self.build_user_interaction(store),
            Layer::ContentSimilarity => self.build_content_similarity(store),
            Layer::TemporalProximity => self.build_temporal_proximity(store),
            Layer::SubredditCooccurrence => self.build_subreddit_cooccurrence(store),
        }
    }

    // ========================================================================
    // User interaction
    // ========================================================================

    /// Authors linked by replies and by shared-subreddit submissions.
    ///
    /// +1 per reply to a different author, +1 per co-occurrence window in
    /// which both authors submitted top-level posts to the same subreddit.
    pub fn build_user_interaction(&self, store: &PostStore) -> EngineResult<LayerGraph> {
        let excluded = &self.config.excluded_authors;
        let authors = store.authors(excluded);
        if authors.len() < self.config.min_distinct_authors {
            return Err(EngineError::insufficient(
                Layer::UserInteraction.as_str(),
                self.config.min_distinct_authors,
                authors.len(),
            ));
        }

        let mut graph = LayerGraph::with_capacity(Layer::UserInteraction, authors.len(), 0);
        for author in &authors {
            graph.add_node(author);
        }

        // Replies
        let mut reply_edges = 0usize;
        for post in store.iter() {
            if let Some(parent) = store.parent_of(post) {
                if graph
                    .add_or_increment_edge(&post.author, &parent.author, 1.0)
                    .is_some()
                {
                    reply_edges += 1;
                }
            }
        }

        // Shared-subreddit co-occurrence windows
        let window_secs = (self.config.cooccurrence_window_hours * 3600.0).max(1.0) as i64;
        let mut windows: BTreeMap<(&str, i64), BTreeSet<&str>> = BTreeMap::new();
        for post in store.iter().filter(|p| p.is_top_level()) {
            if !authors.contains(post.author.as_str()) {
                continue;
            }
            let bucket = post.created_at.timestamp().div_euclid(window_secs);
            windows
                .entry((post.subreddit.as_str(), bucket))
                .or_default()
                .insert(post.author.as_str());
        }
        let mut cooccurrences = 0usize;
        for members in windows.values() {
            let members: Vec<&str> = members.iter().copied().collect();
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    graph.add_or_increment_edge(members[i], members[j], 1.0);
                    cooccurrences += 1;
                }
            }
        }

        tracing::debug!(
            "User layer: replies={} cooccurrences={} windows={}",
            reply_edges,
            cooccurrences,
            windows.len()
        );
        Ok(graph)
    }

    // ========================================================================
    // Content similarity
    // ========================================================================

    /// Posts linked when their TF-IDF cosine similarity exceeds the threshold.
    ///
    /// Every pair is scored while `n(n-1)/2` fits in `max_pairs_compared`.
    /// Above that, candidates come from inverted-index blocking and the layer
    /// is approximate if blocking skipped a shared term or the budget ran out.
    pub fn build_content_similarity(&self, store: &PostStore) -> EngineResult<LayerGraph> {
        self.require_posts(Layer::ContentSimilarity, store)?;

        let posts = store.posts();
        let texts: Vec<String> = posts.iter().map(|p| p.text()).collect();
        let corpus = TfIdfCorpus::build(&texts);

        let n = posts.len();
        let budget = self.config.max_pairs_compared;
        let total_pairs = n.saturating_mul(n.saturating_sub(1)) / 2;
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut truncated = false;
        let mut excluded_terms = 0;

        if total_pairs <= budget {
            pairs.reserve(total_pairs);
            for i in 0..n {
                pairs.extend((i + 1..n).map(|j| (i, j)));
            }
        } else {
            let blocking = corpus.blocking_candidates(self.config.blocking_max_df_ratio);
            excluded_terms = blocking.excluded_terms;
            // Deterministic truncation: pairs are admitted in (i, j) order
            'outer: for (i, js) in blocking.candidates.iter().enumerate() {
                for &j in js {
                    if pairs.len() >= budget {
                        truncated = true;
                        break 'outer;
                    }
                    pairs.push((i, j));
                }
            }
        }

        let threshold = self.config.similarity_threshold;
        let edges: Vec<(usize, usize, f64)> = pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                let sim = cosine(&corpus.vectors[i], &corpus.vectors[j]);
                (sim > threshold).then_some((i, j, sim.min(1.0)))
            })
            .collect();

        let mut graph = LayerGraph::with_capacity(Layer::ContentSimilarity, posts.len(), edges.len());
        for post in posts {
            graph.add_node(&post.id);
        }
        for (i, j, sim) in edges {
            graph.add_or_increment_edge(&posts[i].id, &posts[j].id, sim);
        }
        graph.approximate = truncated || excluded_terms > 0;

        tracing::debug!(
            "Content layer: pairs={} scored={} excluded_terms={} truncated={}",
            total_pairs,
            pairs.len(),
            excluded_terms,
            truncated
        );
        Ok(graph)
    }

    // ========================================================================
    // Temporal proximity
    // ========================================================================

    /// Posts linked when they are closer than the time window, weighted
    /// `1 / (1 + Δhours)`.
    pub fn build_temporal_proximity(&self, store: &PostStore) -> EngineResult<LayerGraph> {
        self.require_posts(Layer::TemporalProximity, store)?;

        let posts = store.posts();
        let window_ms = (self.config.time_window_hours * 3_600_000.0) as i64;
        let mut graph = LayerGraph::with_capacity(Layer::TemporalProximity, posts.len(), 0);
        for post in posts {
            graph.add_node(&post.id);
        }

        let budget = self.config.max_pairs_compared;
        let mut compared = 0usize;
        // Posts are sorted by created_at, so the inner sweep stops at the window edge
        'outer: for (i, a) in posts.iter().enumerate() {
            for b in &posts[i + 1..] {
                let delta_ms = (b.created_at - a.created_at).num_milliseconds();
                if delta_ms >= window_ms {
                    break;
                }
                if compared >= budget {
                    graph.approximate = true;
                    break 'outer;
                }
                compared += 1;
                if self.config.require_shared_context
                    && a.subreddit != b.subreddit
                    && a.author != b.author
                {
                    continue;
                }
                let hours = delta_ms as f64 / 3_600_000.0;
                graph.add_or_increment_edge(&a.id, &b.id, 1.0 / (1.0 + hours));
            }
        }

        tracing::debug!(
            "Temporal layer: compared={} approximate={}",
            compared,
            graph.approximate
        );
        Ok(graph)
    }

    // ========================================================================
    // Subreddit co-occurrence
    // ========================================================================

    /// Subreddits linked by the number of distinct authors active in both.
    pub fn build_subreddit_cooccurrence(&self, store: &PostStore) -> EngineResult<LayerGraph> {
        let subreddits = store.subreddits();
        if subreddits.len() < self.config.min_subreddits {
            return Err(EngineError::insufficient(
                Layer::SubredditCooccurrence.as_str(),
                self.config.min_subreddits,
                subreddits.len(),
            ));
        }

        let mut graph =
            LayerGraph::with_capacity(Layer::SubredditCooccurrence, subreddits.len(), 0);
        for subreddit in &subreddits {
            graph.add_node(subreddit);
        }

        let excluded = &self.config.excluded_authors;
        for (author, posts) in store.posts_by_author() {
            if excluded.iter().any(|e| e == author) {
                continue;
            }
            let active: Vec<&str> = posts
                .iter()
                .map(|p| p.subreddit.as_str())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            for i in 0..active.len() {
                for j in (i + 1)..active.len() {
                    graph.add_or_increment_edge(active[i], active[j], 1.0);
                }
            }
        }
        Ok(graph)
    }

    fn require_posts(&self, layer: Layer, store: &PostStore) -> EngineResult<()> {
        if store.len() < self.config.min_posts {
            return Err(EngineError::insufficient(
                layer.as_str(),
                self.config.min_posts,
                store.len(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
