//! Crisis Signal Engine
//!
//! Turns a table of crisis-related social-media posts into:
//! - Four network layers (user interaction, content similarity, temporal
//!   proximity, subreddit co-occurrence) with per-node centrality and
//!   Louvain communities
//! - Hub roles for authors of the user-interaction layer
//! - Activity time series and crisis phases
//! - A composite Resonance score per post
//! - PADM stage profiles over linguistic category scores
//! - Per-crisis linguistic profiles and cross-crisis proportion tests
//!
//! ## Modules
//!
//! - [`posts`] — validated Post Store, linguistic scores, crisis lexicon
//! - [`network`] — layer construction
//! - [`analytics`] — centrality, communities, layer summaries
//! - [`hubs`] — hub classification rules
//! - [`temporal`] — activity buckets and phase segmentation
//! - [`resonance`] — platform weights and Resonance scoring
//! - [`padm`] — PADM stage profiles
//! - [`comparison`] — linguistic profiles, normalized scores, crisis z-tests
//! - [`engine`] — `SignalEngine` orchestration and `RunReport`
//! - [`export`] — graph and table artifacts

pub mod analytics;
pub mod comparison;
pub mod engine;
pub mod error;
pub mod export;
pub mod hubs;
pub mod network;
pub mod padm;
pub mod posts;
pub mod resonance;
pub mod stats;
pub mod temporal;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use engine::{Completeness, CrisisSignalEngine, LayerReport, RunReport, SignalEngine};
pub use error::{EngineError, EngineResult, RunWarning};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use analytics::{CommunityConfig, MetricConfig};
use comparison::ComparisonConfig;
use hubs::HubConfig;
use network::NetworkConfig;
use resonance::ResonanceConfig;
use temporal::TemporalConfig;

// ============================================================================
// Configuration
// ============================================================================

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "crisis-engine.yaml";

/// Engine configuration, one section per component.
///
/// Every section is optional in YAML; absent keys take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub network: NetworkConfig,
    pub metrics: MetricConfig,
    pub community: CommunityConfig,
    pub hubs: HubConfig,
    pub temporal: TemporalConfig,
    pub resonance: ResonanceConfig,
    pub comparison: ComparisonConfig,
    /// Overrides `metrics.seed` when set
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries [`DEFAULT_CONFIG_FILE`] in CWD. A missing
    /// file falls back to defaults; an unreadable or malformed one is an error.
    ///
    /// Env overrides: `CRISIS_SIMILARITY_THRESHOLD`, `CRISIS_TIME_WINDOW_HOURS`,
    /// `CRISIS_PLATFORM`, `CRISIS_SEED`.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let mut config = Self::load_yaml(yaml_path)?;

        // 2. Env var overrides
        if let Some(v) = env_parsed::<f64>("CRISIS_SIMILARITY_THRESHOLD")? {
            config.network.similarity_threshold = v;
        }
        if let Some(v) = env_parsed::<f64>("CRISIS_TIME_WINDOW_HOURS")? {
            config.network.time_window_hours = v;
        }
        if let Ok(platform) = std::env::var("CRISIS_PLATFORM") {
            config.resonance.platform = platform;
        }
        if let Some(seed) = env_parsed::<u64>("CRISIS_SEED")? {
            config.seed = Some(seed);
        }
        if let Some(seed) = config.seed {
            config.metrics.seed = seed;
        }

        Ok(config)
    }

    fn load_yaml(yaml_path: Option<&Path>) -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let path = yaml_path.unwrap_or(default_path);

        if !path.exists() {
            tracing::debug!(
                "No config file at {}, using env vars / defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values outside their valid ranges.
    pub fn validate(&self) -> EngineResult<()> {
        let n = &self.network;
        check_unit("network.similarity_threshold", n.similarity_threshold)?;
        check_positive("network.time_window_hours", n.time_window_hours)?;
        check_positive("network.cooccurrence_window_hours", n.cooccurrence_window_hours)?;
        check_positive("network.blocking_max_df_ratio", n.blocking_max_df_ratio)?;
        check_unit("network.blocking_max_df_ratio", n.blocking_max_df_ratio)?;

        let m = &self.metrics;
        let damping = m.pagerank_damping;
        if damping.is_nan() || damping <= 0.0 || damping >= 1.0 {
            return Err(invalid(format!(
                "metrics.pagerank_damping must be in (0, 1), got {}",
                damping
            )));
        }
        check_positive("metrics.pagerank_tolerance", m.pagerank_tolerance)?;
        check_nonzero("metrics.pagerank_max_iterations", m.pagerank_max_iterations)?;
        check_nonzero("metrics.betweenness_sample_size", m.betweenness_sample_size)?;

        check_positive("community.resolution", self.community.resolution)?;
        check_nonzero("community.max_passes", self.community.max_passes)?;
        check_nonzero("community.max_sweeps", self.community.max_sweeps)?;

        check_positive("hubs.top_fraction", self.hubs.top_fraction)?;
        check_unit("hubs.top_fraction", self.hubs.top_fraction)?;
        check_unit("hubs.crisis_specialist_ratio", self.hubs.crisis_specialist_ratio)?;

        let k = self.temporal.peak_threshold_k;
        if k.is_nan() || k < 0.0 {
            return Err(invalid(format!(
                "temporal.peak_threshold_k must be non-negative, got {}",
                k
            )));
        }
        check_nonzero("temporal.rolling_window", self.temporal.rolling_window)?;

        let alpha = self.comparison.significance_level;
        if alpha.is_nan() || alpha <= 0.0 || alpha >= 1.0 {
            return Err(invalid(format!(
                "comparison.significance_level must be in (0, 1), got {}",
                alpha
            )));
        }

        self.resonance.weights().map(|_| ())
    }
}

fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

fn invalid(msg: String) -> EngineError {
    EngineError::InvalidConfig(msg)
}

fn check_unit(field: &str, value: f64) -> EngineResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{} must be in [0, 1], got {}", field, value)))
    }
}

fn check_positive(field: &str, value: f64) -> EngineResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{} must be positive, got {}", field, value)))
    }
}

fn check_nonzero(field: &str, value: usize) -> EngineResult<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be at least 1", field)))
    }
}

// ============================================================================
// Tests
// ============================================================================
