//! Temporal segmentation of post activity.
//!
//! - [`models`] — buckets, phases, activity levels and `TemporalConfig`
//! - [`segmenter`] — `TemporalSegmenter` and the phase detection primitives

pub mod models;
pub mod segmenter;

pub use models::{
    ActivityBucket, ActivityLevel, CrisisPhase, DailyActivity, PhaseLabel, PhaseThresholds,
    TemporalConfig, TemporalProfile,
};
pub use segmenter::TemporalSegmenter;
