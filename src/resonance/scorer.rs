//! Composite per-post Resonance.
//!
//! Four sub-scores in [0, 1], each normalized against the batch:
//! - `novelty` — 1 − highest similarity to an earlier content-graph neighbor
//! - `persistence` — log-scaled hours of later activity in the post's thread
//! - `crisis_relevance` — keyword matches relative to the batch maximum
//! - `cognitive_resonance` — weighted linguistic categories relative to the batch maximum

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::weights::{PlatformWeights, ResonanceConfig};
use crate::error::{EngineError, EngineResult, RunWarning};
use crate::network::LayerGraph;
use crate::posts::{CrisisLexicon, LinguisticScores, Post, PostStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonanceScore {
    pub post_id: String,
    pub novelty: f64,
    pub persistence: f64,
    pub crisis_relevance: f64,
    pub cognitive_resonance: f64,
    pub weights: PlatformWeights,
    /// Weighted sum of the sub-scores, clamped to [0, 1]
    pub composite: f64,
    /// Inputs that were absent and scored as 0
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_inputs: Vec<String>,
}

/// Result of scoring a whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResonanceBatch {
    /// Scores in Post Store order
    pub scores: Vec<ResonanceScore>,
    /// Posts that could not be scored
    pub skipped: Vec<EngineError>,
    pub warnings: Vec<RunWarning>,
}

impl ResonanceBatch {
    /// Post ID → composite score.
    pub fn composites(&self) -> BTreeMap<String, f64> {
        self.scores
            .iter()
            .map(|s| (s.post_id.clone(), s.composite))
            .collect()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Scores posts of one store against its content-similarity layer.
///
/// Batch maxima are computed once at construction.
pub struct ResonanceScorer<'a> {
    store: &'a PostStore,
    graph: &'a LayerGraph,
    linguistic: &'a LinguisticScores,
    lexicon: &'a CrisisLexicon,
    weights: PlatformWeights,
    cognitive_categories: &'a BTreeMap<String, f64>,
    /// Position of each post in (created_at, id) order
    order: HashMap<&'a str, usize>,
    /// Last activity in each post's thread
    thread_last: HashMap<&'a str, DateTime<Utc>>,
    max_hours: f64,
    max_matches: usize,
    max_cognitive: f64,
}

impl<'a> ResonanceScorer<'a> {
    pub fn new(
        store: &'a PostStore,
        graph: &'a LayerGraph,
        linguistic: &'a LinguisticScores,
        lexicon: &'a CrisisLexicon,
        weights: PlatformWeights,
        config: &'a ResonanceConfig,
    ) -> Self {
        let order = store
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.as_str(), i))
            .collect();

        let mut thread_last = HashMap::with_capacity(store.len());
        for posts in store.threads().values() {
            if let Some(last) = posts.last().map(|p| p.created_at) {
                for post in posts {
                    thread_last.insert(post.id.as_str(), last);
                }
            }
        }

        let mut scorer = Self {
            store,
            graph,
            linguistic,
            lexicon,
            weights,
            cognitive_categories: &config.cognitive_categories,
            order,
            thread_last,
            max_hours: 0.0,
            max_matches: 0,
            max_cognitive: 0.0,
        };

        let (max_hours, max_matches, max_cognitive) = store
            .posts()
            .par_iter()
            .map(|p| (scorer.later_hours(p), scorer.matches(p), scorer.raw_cognitive(p)))
            .reduce(
                || (0.0, 0, 0.0),
                |a, b| (a.0.max(b.0), a.1.max(b.1), a.2.max(b.2)),
            );
        scorer.max_hours = max_hours;
        scorer.max_matches = max_matches;
        scorer.max_cognitive = max_cognitive;
        scorer
    }

    pub fn weights(&self) -> PlatformWeights {
        self.weights
    }

    /// Score one post.
    ///
    /// Fails with `MissingSignal` when the post is unknown or has no node in
    /// the content graph.
    pub fn score(&self, post_id: &str) -> EngineResult<ResonanceScore> {
        let post = self
            .store
            .get(post_id)
            .ok_or_else(|| EngineError::missing_signal(post_id, "post not in store"))?;
        if !self.graph.contains(post_id) {
            return Err(EngineError::missing_signal(
                post_id,
                "no content-similarity node",
            ));
        }

        let mut missing_inputs = Vec::new();
        let cognitive_resonance = if self.linguistic.has_row(post_id) {
            ratio(self.raw_cognitive(post), self.max_cognitive)
        } else {
            missing_inputs.push("linguistic_scores".to_string());
            0.0
        };

        let novelty = self.novelty(post);
        let persistence = if self.max_hours > 0.0 {
            ((1.0 + self.later_hours(post)).ln() / (1.0 + self.max_hours).ln()).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let crisis_relevance = ratio(self.matches(post) as f64, self.max_matches as f64);

        let w = self.weights;
        let composite = (w.novelty * novelty
            + w.persistence * persistence
            + w.crisis_relevance * crisis_relevance
            + w.cognitive_resonance * cognitive_resonance)
            .clamp(0.0, 1.0);

        Ok(ResonanceScore {
            post_id: post.id.clone(),
            novelty,
            persistence,
            crisis_relevance,
            cognitive_resonance,
            weights: w,
            composite,
            missing_inputs,
        })
    }

    /// Score every post of the store in parallel.
    pub fn score_all(&self) -> ResonanceBatch {
        let results: Vec<EngineResult<ResonanceScore>> = self
            .store
            .posts()
            .par_iter()
            .map(|p| self.score(&p.id))
            .collect();

        let mut batch = ResonanceBatch::default();
        for result in results {
            match result {
                Ok(score) => batch.scores.push(score),
                Err(e) => batch.skipped.push(e),
            }
        }

        let without_linguistic = batch
            .scores
            .iter()
            .filter(|s| !s.missing_inputs.is_empty())
            .count();
        if without_linguistic > 0 {
            batch.warnings.push(RunWarning::MissingInput {
                scope: "resonance".to_string(),
                detail: format!(
                    "{} posts without linguistic scores; cognitive_resonance set to 0",
                    without_linguistic
                ),
            });
        }

        tracing::info!(
            "Scored resonance posts={} skipped={} missing_linguistic={}",
            batch.scores.len(),
            batch.skipped.len(),
            without_linguistic
        );
        batch
    }

    // ========================================================================
    // Sub-score inputs
    // ========================================================================

    /// 1 − max similarity to neighbors that precede the post.
    fn novelty(&self, post: &Post) -> f64 {
        let Some(&position) = self.order.get(post.id.as_str()) else {
            return 1.0;
        };
        let max_similarity = self
            .graph
            .neighbors(&post.id)
            .into_iter()
            .filter(|(id, _)| self.order.get(id).is_some_and(|&p| p < position))
            .map(|(_, w)| w)
            .fold(0.0, f64::max);
        (1.0 - max_similarity).clamp(0.0, 1.0)
    }

    /// Hours from the post to the last later activity in its thread.
    fn later_hours(&self, post: &Post) -> f64 {
        self.thread_last
            .get(post.id.as_str())
            .map(|last| (*last - post.created_at).num_seconds().max(0) as f64 / 3600.0)
            .unwrap_or(0.0)
    }

    fn matches(&self, post: &Post) -> usize {
        self.lexicon.count_matches(&post.text())
    }

    fn raw_cognitive(&self, post: &Post) -> f64 {
        self.linguistic
            .weighted(&post.id, self.cognitive_categories)
            .max(0.0)
    }
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
