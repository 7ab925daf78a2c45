//! Platform weight table and Resonance configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult, RunWarning};
use crate::posts::lexicon::DEFAULT_CRISIS_KEYWORDS;

/// Sums closer to 1 than this are accepted as-is.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weight of each Resonance sub-score for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformWeights {
    pub novelty: f64,
    pub persistence: f64,
    pub crisis_relevance: f64,
    pub cognitive_resonance: f64,
}

impl PlatformWeights {
    pub const UNIFORM: PlatformWeights = PlatformWeights {
        novelty: 0.25,
        persistence: 0.25,
        crisis_relevance: 0.25,
        cognitive_resonance: 0.25,
    };

    pub fn sum(&self) -> f64 {
        self.novelty + self.persistence + self.crisis_relevance + self.cognitive_resonance
    }

    fn as_array(&self) -> [f64; 4] {
        [
            self.novelty,
            self.persistence,
            self.crisis_relevance,
            self.cognitive_resonance,
        ]
    }

    /// Check the range of each weight and normalize the sum to 1.
    ///
    /// Returns a `WeightsNormalized` warning when rescaling was needed.
    pub fn validated(self, platform: &str) -> EngineResult<(Self, Option<RunWarning>)> {
        if self
            .as_array()
            .iter()
            .any(|w| !w.is_finite() || !(0.0..=1.0).contains(w))
        {
            return Err(EngineError::InvalidConfig(format!(
                "platform `{}` weights must each lie in [0, 1]",
                platform
            )));
        }
        let sum = self.sum();
        if sum <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "platform `{}` weights sum to zero",
                platform
            )));
        }
        if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
            return Ok((self, None));
        }
        tracing::warn!(
            "Normalizing resonance weights platform={} original_sum={:.4}",
            platform,
            sum
        );
        let normalized = Self {
            novelty: self.novelty / sum,
            persistence: self.persistence / sum,
            crisis_relevance: self.crisis_relevance / sum,
            cognitive_resonance: self.cognitive_resonance / sum,
        };
        Ok((
            normalized,
            Some(RunWarning::WeightsNormalized {
                platform: platform.to_string(),
                original_sum: sum,
            }),
        ))
    }
}

impl Default for PlatformWeights {
    fn default() -> Self {
        Self::UNIFORM
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    /// Platform whose weights score this batch (default: "reddit")
    pub platform: String,
    /// Platform → weights; platforms not listed use uniform 0.25 weights
    pub platform_weights: BTreeMap<String, PlatformWeights>,
    /// Linguistic category → weight for cognitive resonance
    pub cognitive_categories: BTreeMap<String, f64>,
    /// Keywords counted for crisis relevance
    pub crisis_keywords: Vec<String>,
}

impl ResonanceConfig {
    /// Validated weights for the configured platform.
    pub fn weights(&self) -> EngineResult<(PlatformWeights, Option<RunWarning>)> {
        match self.platform_weights.get(&self.platform) {
            Some(weights) => weights.validated(&self.platform),
            None => {
                tracing::debug!(
                    "No weights for platform={}, using uniform fallback",
                    self.platform
                );
                Ok((PlatformWeights::UNIFORM, None))
            }
        }
    }
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            platform: "reddit".to_string(),
            platform_weights: BTreeMap::new(),
            cognitive_categories: ["cogproc", "insight", "causation", "certainty"]
                .iter()
                .map(|c| (c.to_string(), 0.25))
                .collect(),
            crisis_keywords: DEFAULT_CRISIS_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_fallback() {
        let config = ResonanceConfig::default();
        let (weights, warning) = config.weights().unwrap();
        assert_eq!(weights, PlatformWeights::UNIFORM);
        assert!(warning.is_none());
    }

    #[test]
    fn test_off_sum_weights_normalized_with_warning() {
        let weights = PlatformWeights {
            novelty: 0.5,
            persistence: 0.5,
            crisis_relevance: 0.5,
            cognitive_resonance: 0.5,
        };
        let (normalized, warning) = weights.validated("reddit").unwrap();
        assert!((normalized.sum() - 1.0).abs() < 1e-12);
        assert!((normalized.novelty - 0.25).abs() < 1e-12);
        assert!(matches!(
            warning,
            Some(RunWarning::WeightsNormalized { original_sum, .. }) if (original_sum - 2.0).abs() < 1e-12
        ));
    }

    #[test]
    fn test_zero_sum_is_invalid() {
        let weights = PlatformWeights {
            novelty: 0.0,
            persistence: 0.0,
            crisis_relevance: 0.0,
            cognitive_resonance: 0.0,
        };
        assert!(matches!(
            weights.validated("reddit"),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_out_of_range_weight_is_invalid() {
        let weights = PlatformWeights {
            novelty: 1.5,
            ..PlatformWeights::UNIFORM
        };
        assert!(weights.validated("reddit").is_err());
    }

    #[test]
    fn test_platform_table_from_yaml() {
        let yaml = r#"
platform: twitter
platform_weights:
  twitter:
    novelty: 0.4
    persistence: 0.1
    crisis_relevance: 0.3
    cognitive_resonance: 0.2
"#;
        let config: ResonanceConfig = serde_yaml::from_str(yaml).unwrap();
        let (weights, warning) = config.weights().unwrap();
        assert!((weights.novelty - 0.4).abs() < f64::EPSILON);
        assert!(warning.is_none());
        assert_eq!(config.cognitive_categories.len(), 4);
    }
}
