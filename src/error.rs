//! Error taxonomy and non-fatal run warnings.
//!
//! - [`EngineError`] — failures that abort a run (`Schema`), a single layer
//!   (`InsufficientData`), a single post (`MissingSignal`), or reject a
//!   configuration (`InvalidConfig`).
//! - [`RunWarning`] — conditions that degrade a result without failing it
//!   (iteration caps, sampled algorithms, missing optional inputs).

use serde::{Deserialize, Serialize};

/// Result alias used by the typed engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineError {
    /// Malformed or missing input columns. Fatal for the whole run.
    #[error("schema error: {0}")]
    Schema(String),

    /// Too few nodes/posts for structural analysis of one layer.
    #[error("insufficient data for {scope}: need at least {required}, found {found}")]
    InsufficientData {
        scope: String,
        required: usize,
        found: usize,
    },

    /// A single post cannot be scored. The batch continues without it.
    #[error("missing signal for post {post_id}: {reason}")]
    MissingSignal { post_id: String, reason: String },

    /// Configuration values outside their valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn insufficient(scope: impl Into<String>, required: usize, found: usize) -> Self {
        Self::InsufficientData {
            scope: scope.into(),
            required,
            found,
        }
    }

    pub fn missing_signal(post_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingSignal {
            post_id: post_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole run rather than one layer or post.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::InvalidConfig(_))
    }
}

/// Non-fatal condition attached to a run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// An iterative algorithm hit its iteration cap; the best estimate is kept.
    Convergence {
        scope: String,
        algorithm: String,
        iterations: usize,
    },
    /// A bound was exceeded and a sampled/truncated algorithm was used.
    Approximation { scope: String, detail: String },
    /// An optional input was missing and the affected value defaulted to 0.
    MissingInput { scope: String, detail: String },
    /// A layer could not be built or analyzed; other layers continued.
    LayerSkipped { layer: String, reason: String },
    /// Platform weights did not sum to 1 and were rescaled.
    WeightsNormalized { platform: String, original_sum: f64 },
}
