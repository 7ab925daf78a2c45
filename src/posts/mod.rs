//! Input tables consumed by the engine.
//!
//! - [`models`] — `Post` and the validated `PostStore`
//! - [`linguistic`] — per-post linguistic category scores
//! - [`lexicon`] — crisis keyword vocabulary

pub mod lexicon;
pub mod linguistic;
pub mod models;

pub use lexicon::CrisisLexicon;
pub use linguistic::{CategoryScores, LinguisticScores};
pub use models::{EngagementCategory, Post, PostStore, REQUIRED_COLUMNS};
