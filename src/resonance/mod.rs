//! Resonance scoring.
//!
//! - [`weights`] — `PlatformWeights` validation and `ResonanceConfig`
//! - [`scorer`] — `ResonanceScorer` and batch results

pub mod scorer;
pub mod weights;

pub use scorer::{ResonanceBatch, ResonanceScore, ResonanceScorer};
pub use weights::{PlatformWeights, ResonanceConfig};
