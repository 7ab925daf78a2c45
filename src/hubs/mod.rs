//! Hub classification over the user-interaction layer.
//!
//! - [`models`] — `HubLabel`, `NodeFeatures`, `HubReport`, `HubConfig`
//! - [`rules`] — the `HubRule` trait and the six standard predicates
//! - [`classifier`] — builds per-author features and applies the rules

pub mod classifier;
pub mod models;
pub mod rules;

pub use classifier::{HubClassifier, HubInput};
pub use models::{HubConfig, HubLabel, HubRankings, HubRecord, HubReport, NodeFeatures, RankedNode};
pub use rules::HubRule;
