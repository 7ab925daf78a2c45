//! Signal engine — orchestrates the full analysis of one Post Store.
//!
//! The `SignalEngine` trait is the single entry point for consumers. A run:
//!
//! 1. **Segmentation + construction**: temporal profile and the four network
//!    layers, side by side
//! 2. **Structure**: metrics, communities and a summary for every layer that
//!    could be built, in parallel
//! 3. **Signals**: Resonance on the content layer, hubs on the user layer,
//!    PADM stage profiles and the linguistic profile
//!
//! [`SignalEngine::compare_crises`] sets the crises of one store against
//! each other on their linguistic categories.
//!
//! Only schema failures, invalid configuration and an empty store abort a
//! run. Everything else is recorded in the [`RunReport`].

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::{
    compute, detect, summarize, CommunityPartition, GraphSummary, MetricsResult,
};
use crate::comparison::{self, CrisisComparison, LinguisticProfile};
use crate::error::{EngineError, EngineResult, RunWarning};
use crate::hubs::{HubClassifier, HubInput, HubReport};
use crate::network::{Layer, LayerGraph, NetworkBuilder};
use crate::padm::{self, PadmReport};
use crate::posts::{CrisisLexicon, EngagementCategory, LinguisticScores, PostStore};
use crate::resonance::{ResonanceBatch, ResonanceScorer};
use crate::temporal::{TemporalProfile, TemporalSegmenter};
use crate::EngineConfig;

// ============================================================================
// Output types
// ============================================================================

/// How faithful an artifact is to the exact computation.
///
/// Ordered from best to worst so that combining two flags keeps the worse one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Exact,
    /// A bound was exceeded and a sampled or truncated algorithm was used
    Approximate,
    /// An input was missing or an algorithm did not converge
    Degraded,
}

/// Structural analysis of one layer.
#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    pub layer: Layer,
    #[serde(skip)]
    pub graph: LayerGraph,
    pub metrics: MetricsResult,
    pub communities: CommunityPartition,
    pub summary: GraphSummary,
    pub completeness: Completeness,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Set when the run covered a single crisis
    pub crisis_id: Option<String>,
    pub post_count: usize,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub layers: BTreeMap<Layer, LayerReport>,
    /// Layers that could not be built
    pub layer_errors: BTreeMap<Layer, EngineError>,
    pub temporal: TemporalProfile,
    /// `None` when the content-similarity layer is unavailable
    pub resonance: Option<ResonanceBatch>,
    /// `None` when the user-interaction layer is unavailable
    pub hubs: Option<HubReport>,
    pub padm: PadmReport,
    /// Category-group distributions of the run's scored posts
    pub linguistic_profile: LinguisticProfile,
    /// Artifact name → completeness flag
    pub completeness: BTreeMap<String, Completeness>,
    pub engagement: BTreeMap<EngagementCategory, usize>,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub fn layer(&self, layer: Layer) -> Option<&LayerReport> {
        self.layers.get(&layer)
    }

    pub fn completeness_of(&self, artifact: &str) -> Option<Completeness> {
        self.completeness.get(artifact).copied()
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Signal engine trait — single entry point for crisis-signal analysis.
pub trait SignalEngine: Send + Sync {
    /// Analyze the whole store.
    fn run(&self, store: &PostStore, linguistic: &LinguisticScores) -> EngineResult<RunReport>;

    /// Analyze each crisis separately. Posts without a `crisis_id` are not
    /// part of any crisis run.
    fn run_by_crisis(
        &self,
        store: &PostStore,
        linguistic: &LinguisticScores,
    ) -> BTreeMap<String, EngineResult<RunReport>>;

    /// Profile each crisis and test every crisis pair for differences in
    /// linguistic category proportions.
    fn compare_crises(
        &self,
        store: &PostStore,
        linguistic: &LinguisticScores,
    ) -> EngineResult<CrisisComparison>;
}

// ============================================================================
// Concrete implementation
// ============================================================================

/// Default engine composing the builder, analytics, classifiers and scorers.
pub struct CrisisSignalEngine {
    config: EngineConfig,
    builder: NetworkBuilder,
    segmenter: TemporalSegmenter,
    classifier: HubClassifier,
}

impl CrisisSignalEngine {
    /// Create an engine, rejecting out-of-range configuration.
    ///
    /// A top-level `seed` overrides `metrics.seed`.
    pub fn new(mut config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        if let Some(seed) = config.seed {
            config.metrics.seed = seed;
        }
        Ok(Self {
            builder: NetworkBuilder::new(config.network.clone()),
            segmenter: TemporalSegmenter::new(config.temporal.clone()),
            classifier: HubClassifier::new(config.hubs.clone()),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn analyze_layer(&self, graph: LayerGraph) -> LayerReport {
        let (metrics, communities) = rayon::join(
            || compute(&graph, &self.config.metrics),
            || detect(&graph, &self.config.community),
        );
        let summary = summarize(&graph, Some(&communities), &self.config.metrics);

        let completeness = if !metrics.pagerank_converged {
            Completeness::Degraded
        } else if graph.approximate || metrics.betweenness_approximate || summary.approximate {
            Completeness::Approximate
        } else {
            Completeness::Exact
        };

        info!(
            "Layer analyzed: layer={} nodes={} edges={} communities={} modularity={:.4}",
            graph.layer,
            summary.node_count,
            summary.edge_count,
            communities.len(),
            communities.modularity
        );

        LayerReport {
            layer: graph.layer,
            graph,
            metrics,
            communities,
            summary,
            completeness,
        }
    }
}

impl Default for CrisisSignalEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            builder: NetworkBuilder::new(config.network.clone()),
            segmenter: TemporalSegmenter::new(config.temporal.clone()),
            classifier: HubClassifier::new(config.hubs.clone()),
            config,
        }
    }
}

impl SignalEngine for CrisisSignalEngine {
    fn run(&self, store: &PostStore, linguistic: &LinguisticScores) -> EngineResult<RunReport> {
        if store.is_empty() {
            return Err(EngineError::insufficient("post_store", 1, 0));
        }
        let resonance_config = &self.config.resonance;
        let (weights, weight_warning) = resonance_config.weights()?;
        let lexicon = CrisisLexicon::new(&resonance_config.crisis_keywords)?;

        info!(
            "Signal run started: posts={} linguistic_rows={} platform={}",
            store.len(),
            linguistic.len(),
            resonance_config.platform
        );

        let mut warnings: Vec<RunWarning> = weight_warning.into_iter().collect();
        let mut completeness = BTreeMap::new();

        // 1. Segmentation + construction
        let (temporal, layers) = rayon::join(
            || self.segmenter.segment(store),
            || self.builder.build(store),
        );
        let temporal = temporal?;
        completeness.insert("temporal".to_string(), Completeness::Exact);

        let mut graphs = Vec::with_capacity(layers.len());
        let mut layer_errors = BTreeMap::new();
        for (layer, result) in layers {
            match result {
                Ok(graph) => graphs.push(graph),
                Err(e) => {
                    warn!("Layer skipped: layer={} reason={}", layer, e);
                    warnings.push(RunWarning::LayerSkipped {
                        layer: layer.as_str().to_string(),
                        reason: e.to_string(),
                    });
                    completeness.insert(format!("layer.{}", layer), Completeness::Degraded);
                    layer_errors.insert(layer, e);
                }
            }
        }

        // 2. Structure
        let layer_reports: BTreeMap<Layer, LayerReport> = graphs
            .into_par_iter()
            .map(|graph| {
                let report = self.analyze_layer(graph);
                (report.layer, report)
            })
            .collect();
        for report in layer_reports.values() {
            warnings.extend(report.metrics.warnings.iter().cloned());
            completeness.insert(format!("layer.{}", report.layer), report.completeness);
        }

        // 3. Signals
        let content = layer_reports.get(&Layer::ContentSimilarity);
        let resonance = content.map(|content| {
            ResonanceScorer::new(
                store,
                &content.graph,
                linguistic,
                &lexicon,
                weights,
                resonance_config,
            )
            .score_all()
        });
        let resonance_flag = match (&resonance, content) {
            (Some(batch), Some(content)) => {
                warnings.extend(batch.warnings.iter().cloned());
                if batch.skipped_count() > 0 || !batch.warnings.is_empty() {
                    Completeness::Degraded
                } else {
                    content.completeness
                }
            }
            _ => {
                warnings.push(RunWarning::MissingInput {
                    scope: "resonance".to_string(),
                    detail: "content similarity layer unavailable".to_string(),
                });
                Completeness::Degraded
            }
        };
        completeness.insert("resonance".to_string(), resonance_flag);

        let composites = resonance.as_ref().map(ResonanceBatch::composites);
        let user = layer_reports.get(&Layer::UserInteraction);
        let hubs = user.map(|user| {
            self.classifier.classify(&HubInput {
                graph: &user.graph,
                metrics: &user.metrics,
                partition: &user.communities,
                store,
                linguistic,
                lexicon: &lexicon,
                resonance: composites.as_ref(),
            })
        });
        let hub_flag = match user {
            Some(user) if composites.is_some() => user.completeness,
            Some(_) => Completeness::Degraded,
            None => {
                warnings.push(RunWarning::MissingInput {
                    scope: "hubs".to_string(),
                    detail: "user interaction layer unavailable".to_string(),
                });
                Completeness::Degraded
            }
        };
        completeness.insert("hubs".to_string(), hub_flag);

        let padm = padm::profile(linguistic, store);
        warnings.extend(padm.warnings.iter().cloned());
        completeness.insert(
            "padm".to_string(),
            if padm.warnings.is_empty() {
                Completeness::Exact
            } else {
                Completeness::Degraded
            },
        );

        let linguistic_profile = comparison::profile(linguistic, store);
        completeness.insert(
            "linguistic_profile".to_string(),
            if linguistic_profile.scored_posts == store.len() {
                Completeness::Exact
            } else {
                Completeness::Degraded
            },
        );

        info!(
            "Signal run finished: layers={} failed_layers={} hubs={} scored_posts={} warnings={}",
            layer_reports.len(),
            layer_errors.len(),
            hubs.as_ref().map_or(0, |h| h.records.len()),
            resonance.as_ref().map_or(0, |r| r.scores.len()),
            warnings.len()
        );

        Ok(RunReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            crisis_id: None,
            post_count: store.len(),
            time_range: store.time_range(),
            layers: layer_reports,
            layer_errors,
            temporal,
            resonance,
            hubs,
            padm,
            linguistic_profile,
            completeness,
            engagement: store.engagement_breakdown(),
            warnings,
        })
    }

    fn run_by_crisis(
        &self,
        store: &PostStore,
        linguistic: &LinguisticScores,
    ) -> BTreeMap<String, EngineResult<RunReport>> {
        let crisis_ids: Vec<&str> = store.crisis_ids().into_iter().collect();
        info!("Per-crisis runs: crises={}", crisis_ids.len());

        crisis_ids
            .into_par_iter()
            .map(|crisis_id| {
                let subset = store.filter_crisis(crisis_id);
                let result = self.run(&subset, linguistic).map(|mut report| {
                    report.crisis_id = Some(crisis_id.to_string());
                    report
                });
                (crisis_id.to_string(), result)
            })
            .collect()
    }

    fn compare_crises(
        &self,
        store: &PostStore,
        linguistic: &LinguisticScores,
    ) -> EngineResult<CrisisComparison> {
        comparison::compare(store, linguistic, &self.config.comparison)
    }
}

// ============================================================================
// Tests
// ============================================================================
