//! Cross-crisis linguistic comparison.
//!
//! - [`profile`] — per-crisis distribution of the cognitive, emotional,
//!   behavioral and perceptual categories
//! - [`base_rates`] / [`normalized_scores`] — Normalized Linguistic Scores,
//!   `(score − base) / base · 100` against the corpus median
//! - [`compare`] — pairwise two-proportion z-tests between crises
//!
//! Only posts with a linguistic row take part, as in the PADM profiler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, EngineResult, RunWarning};
use crate::posts::{CategoryScores, LinguisticScores, PostStore};
use crate::stats::{mean, median, percentile, sample_std, two_tailed_p};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryGroup {
    Cognitive,
    Emotional,
    Behavioral,
    Perceptual,
}

impl CategoryGroup {
    pub const ALL: [CategoryGroup; 4] = [
        Self::Cognitive,
        Self::Emotional,
        Self::Behavioral,
        Self::Perceptual,
    ];

    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            Self::Cognitive => &["cogproc", "causation", "certainty", "insight", "tentative"],
            Self::Emotional => &["affect", "posemo", "negemo", "anx", "anger", "sad"],
            Self::Behavioral => &["risk", "social", "time", "space", "motion"],
            Self::Perceptual => &["percept", "see", "hear", "feel"],
        }
    }
}

impl std::fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cognitive => write!(f, "cognitive"),
            Self::Emotional => write!(f, "emotional"),
            Self::Behavioral => write!(f, "behavioral"),
            Self::Perceptual => write!(f, "perceptual"),
        }
    }
}

/// Comparison settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// A test is significant when its p-value is below this level (default: 0.05)
    pub significance_level: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
        }
    }
}

// ============================================================================
// Output types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub category: String,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Linguistic profile of one set of posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LinguisticProfile {
    pub post_count: usize,
    /// Posts with a linguistic row; the statistics cover only these
    pub scored_posts: usize,
    pub unique_authors: usize,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Present categories of each group, in group order
    pub groups: BTreeMap<CategoryGroup, Vec<DistributionStats>>,
}

impl LinguisticProfile {
    pub fn category(&self, name: &str) -> Option<&DistributionStats> {
        self.groups
            .values()
            .flatten()
            .find(|stats| stats.category == name)
    }
}

/// Two-proportion z-test of one category between two crises.
///
/// A post counts when its score is strictly above `threshold`, the median
/// of the category over every compared post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionTest {
    pub crisis_a: String,
    pub crisis_b: String,
    pub category: String,
    pub threshold: f64,
    pub proportion_a: f64,
    pub proportion_b: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub significant: bool,
    pub sample_sizes: (usize, usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CrisisComparison {
    /// Category → median over the compared posts
    pub base_rates: BTreeMap<String, f64>,
    pub profiles: BTreeMap<String, LinguisticProfile>,
    /// Crisis → category → mean Normalized Linguistic Score
    pub normalized_means: BTreeMap<String, BTreeMap<String, f64>>,
    /// Ordered by (crisis_a, crisis_b, category) with `crisis_a < crisis_b`
    pub tests: Vec<ProportionTest>,
    pub warnings: Vec<RunWarning>,
}

impl CrisisComparison {
    pub fn test(&self, crisis_a: &str, crisis_b: &str, category: &str) -> Option<&ProportionTest> {
        self.tests
            .iter()
            .find(|t| t.crisis_a == crisis_a && t.crisis_b == crisis_b && t.category == category)
    }

    pub fn significant(&self) -> impl Iterator<Item = &ProportionTest> {
        self.tests.iter().filter(|t| t.significant)
    }
}

// ============================================================================
// Profiles and normalization
// ============================================================================

fn scored_ids<'a>(linguistic: &LinguisticScores, store: &'a PostStore) -> Vec<&'a str> {
    store
        .iter()
        .map(|p| p.id.as_str())
        .filter(|id| linguistic.has_row(id))
        .collect()
}

/// Distribution of every present group category over the scored posts of `store`.
pub fn profile(linguistic: &LinguisticScores, store: &PostStore) -> LinguisticProfile {
    let present = linguistic.categories();
    let ids = scored_ids(linguistic, store);

    let mut groups = BTreeMap::new();
    if !ids.is_empty() {
        for group in CategoryGroup::ALL {
            let stats: Vec<DistributionStats> = group
                .categories()
                .iter()
                .filter(|c| present.contains(*c))
                .map(|category| {
                    let values: Vec<f64> =
                        ids.iter().map(|id| linguistic.score(id, category)).collect();
                    DistributionStats {
                        category: category.to_string(),
                        mean: mean(&values),
                        median: median(&values),
                        std_dev: sample_std(&values),
                        p75: percentile(&values, 0.75),
                        p90: percentile(&values, 0.9),
                    }
                })
                .collect();
            if !stats.is_empty() {
                groups.insert(group, stats);
            }
        }
    }

    LinguisticProfile {
        post_count: store.len(),
        scored_posts: ids.len(),
        unique_authors: store.iter().map(|p| p.author.as_str()).collect::<BTreeSet<_>>().len(),
        time_range: store.time_range(),
        groups,
    }
}

/// Median of every present category over the scored posts of `store`.
pub fn base_rates(linguistic: &LinguisticScores, store: &PostStore) -> BTreeMap<String, f64> {
    let ids = scored_ids(linguistic, store);
    linguistic
        .categories()
        .into_iter()
        .map(|category| {
            let values: Vec<f64> = ids.iter().map(|id| linguistic.score(id, category)).collect();
            (category.to_string(), median(&values))
        })
        .collect()
}

/// `(score − base) / base · 100` per post and category.
///
/// Categories without a positive base rate normalize to 0.
pub fn normalized_scores(
    linguistic: &LinguisticScores,
    base_rates: &BTreeMap<String, f64>,
) -> LinguisticScores {
    let mut normalized = LinguisticScores::new();
    for id in linguistic.post_ids() {
        let row: CategoryScores = base_rates
            .iter()
            .map(|(category, &base)| {
                let nls = if base > 0.0 {
                    (linguistic.score(id, category) - base) / base * 100.0
                } else {
                    0.0
                };
                (category.clone(), nls)
            })
            .collect();
        normalized.insert(id, row);
    }
    normalized
}

// ============================================================================
// Cross-crisis tests
// ============================================================================

/// Pooled two-proportion z statistic and its two-tailed p-value.
///
/// `None` when either sample is empty or the pooled standard error is 0.
pub fn proportion_test(count_a: usize, n_a: usize, count_b: usize, n_b: usize) -> Option<(f64, f64)> {
    if n_a == 0 || n_b == 0 {
        return None;
    }
    let (na, nb) = (n_a as f64, n_b as f64);
    let pa = count_a as f64 / na;
    let pb = count_b as f64 / nb;
    let pooled = (count_a + count_b) as f64 / (na + nb);
    let se = (pooled * (1.0 - pooled) * (1.0 / na + 1.0 / nb)).sqrt();
    if se <= 0.0 || !se.is_finite() {
        return None;
    }
    let z = (pa - pb) / se;
    Some((z, two_tailed_p(z)))
}

/// Compare the crises of `store` against each other.
///
/// Posts without a `crisis_id` are left out. Needs at least two crises with
/// scored posts.
pub fn compare(
    store: &PostStore,
    linguistic: &LinguisticScores,
    config: &ComparisonConfig,
) -> EngineResult<CrisisComparison> {
    let crises: BTreeMap<String, PostStore> = store
        .crisis_ids()
        .into_iter()
        .map(|id| (id.to_string(), store.filter_crisis(id)))
        .collect();

    let mut warnings = Vec::new();
    let mut scored: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (crisis, subset) in &crises {
        let ids = scored_ids(linguistic, subset);
        if ids.is_empty() {
            warnings.push(RunWarning::MissingInput {
                scope: format!("comparison.{}", crisis),
                detail: "no posts with linguistic scores".to_string(),
            });
            continue;
        }
        scored.insert(crisis.as_str(), ids);
    }
    if scored.len() < 2 {
        return Err(EngineError::insufficient("crisis_comparison", 2, scored.len()));
    }

    let categories: Vec<&str> = linguistic.categories().into_iter().collect();
    let pooled: Vec<&str> = scored.values().flatten().copied().collect();
    let base_rates: BTreeMap<String, f64> = categories
        .iter()
        .map(|c| {
            let values: Vec<f64> = pooled.iter().map(|id| linguistic.score(id, c)).collect();
            (c.to_string(), median(&values))
        })
        .collect();

    let normalized = normalized_scores(linguistic, &base_rates);
    let normalized_means: BTreeMap<String, BTreeMap<String, f64>> = scored
        .iter()
        .map(|(crisis, ids)| {
            let means: BTreeMap<String, f64> = categories
                .iter()
                .map(|c| {
                    let values: Vec<f64> = ids.iter().map(|id| normalized.score(id, c)).collect();
                    (c.to_string(), mean(&values))
                })
                .collect();
            (crisis.to_string(), means)
        })
        .collect();

    let names: Vec<&str> = scored.keys().copied().collect();
    let mut tests = Vec::new();
    for (i, &a) in names.iter().enumerate() {
        for &b in &names[i + 1..] {
            let (ids_a, ids_b) = (&scored[a], &scored[b]);
            for &category in &categories {
                let threshold = base_rates[category];
                let above = |ids: &[&str]| {
                    ids.iter()
                        .filter(|id| linguistic.score(id, category) > threshold)
                        .count()
                };
                let (count_a, count_b) = (above(ids_a.as_slice()), above(ids_b.as_slice()));
                let Some((z_score, p_value)) =
                    proportion_test(count_a, ids_a.len(), count_b, ids_b.len())
                else {
                    continue;
                };
                tests.push(ProportionTest {
                    crisis_a: a.to_string(),
                    crisis_b: b.to_string(),
                    category: category.to_string(),
                    threshold,
                    proportion_a: count_a as f64 / ids_a.len() as f64,
                    proportion_b: count_b as f64 / ids_b.len() as f64,
                    z_score,
                    p_value,
                    significant: p_value < config.significance_level,
                    sample_sizes: (ids_a.len(), ids_b.len()),
                });
            }
        }
    }

    let profiles: BTreeMap<String, LinguisticProfile> = scored
        .keys()
        .map(|crisis| (crisis.to_string(), profile(linguistic, &crises[*crisis])))
        .collect();

    tracing::info!(
        "Crisis comparison: crises={} categories={} tests={} significant={}",
        names.len(),
        categories.len(),
        tests.len(),
        tests.iter().filter(|t| t.significant).count()
    );

    Ok(CrisisComparison {
        base_rates,
        profiles,
        normalized_means,
        tests,
        warnings,
    })
}
