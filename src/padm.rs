//! Protective Action Decision Model stage profiles.
//!
//! Each stage groups linguistic categories: exposure (perceptual
//! processes), attention (cognitive processing and discrimination) and
//! comprehension (insight and causal reasoning). For every category present
//! in the score table the profiler reports descriptive statistics and the
//! number of posts above the category's 90th percentile.

use serde::{Deserialize, Serialize};

use crate::error::RunWarning;
use crate::posts::{LinguisticScores, PostStore};
use crate::stats::{mean, median, percentile, sample_std};

/// Quantile above which a post counts as high for a category or stage.
const HIGH_QUANTILE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadmStage {
    Exposure,
    Attention,
    Comprehension,
}

impl PadmStage {
    pub const ALL: [PadmStage; 3] = [Self::Exposure, Self::Attention, Self::Comprehension];

    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            Self::Exposure => &["percept", "see", "hear", "feel"],
            Self::Attention => &["cogproc", "comparison", "differentiation"],
            Self::Comprehension => &["insight", "certainty", "causation"],
        }
    }
}

impl std::fmt::Display for PadmStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exposure => write!(f, "exposure"),
            Self::Attention => write!(f, "attention"),
            Self::Comprehension => write!(f, "comprehension"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p90: f64,
    /// Posts strictly above `p90`
    pub high_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProfile {
    pub stage: PadmStage,
    pub categories: Vec<CategoryStats>,
    /// Stage categories absent from the score table
    pub missing_categories: Vec<String>,
    /// Mean over posts of the per-post stage score (mean of present categories)
    pub overall_mean: f64,
    /// Posts whose stage score exceeds the stage's 90th percentile
    pub high_stage_posts: usize,
    pub post_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PadmReport {
    pub stages: Vec<StageProfile>,
    pub warnings: Vec<RunWarning>,
}

/// Profile the posts of `store` that have a linguistic row.
pub fn profile(linguistic: &LinguisticScores, store: &PostStore) -> PadmReport {
    let present = linguistic.categories();
    let post_ids: Vec<&str> = store
        .iter()
        .map(|p| p.id.as_str())
        .filter(|id| linguistic.has_row(id))
        .collect();

    let mut report = PadmReport::default();
    for stage in PadmStage::ALL {
        let (found, missing): (Vec<&str>, Vec<&str>) = stage
            .categories()
            .iter()
            .copied()
            .partition(|c| present.contains(c));

        if found.is_empty() || post_ids.is_empty() {
            report.warnings.push(RunWarning::MissingInput {
                scope: format!("padm.{}", stage),
                detail: format!(
                    "no scores for categories {}",
                    stage.categories().join(", ")
                ),
            });
            continue;
        }

        let columns: Vec<Vec<f64>> = found
            .iter()
            .map(|c| post_ids.iter().map(|id| linguistic.score(id, c)).collect())
            .collect();

        let categories = found
            .iter()
            .zip(&columns)
            .map(|(category, values)| {
                let p90 = percentile(values, HIGH_QUANTILE);
                CategoryStats {
                    category: category.to_string(),
                    mean: mean(values),
                    median: median(values),
                    std_dev: sample_std(values),
                    p90,
                    high_count: values.iter().filter(|&&v| v > p90).count(),
                }
            })
            .collect();

        let stage_scores: Vec<f64> = (0..post_ids.len())
            .map(|row| columns.iter().map(|col| col[row]).sum::<f64>() / columns.len() as f64)
            .collect();
        let stage_p90 = percentile(&stage_scores, HIGH_QUANTILE);

        report.stages.push(StageProfile {
            stage,
            categories,
            missing_categories: missing.iter().map(|c| c.to_string()).collect(),
            overall_mean: mean(&stage_scores),
            high_stage_posts: stage_scores.iter().filter(|&&v| v > stage_p90).count(),
            post_count: post_ids.len(),
        });
    }

    tracing::debug!(
        "PADM profile posts={} stages={} warnings={}",
        post_ids.len(),
        report.stages.len(),
        report.warnings.len()
    );
    report
}
