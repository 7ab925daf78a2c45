//! Per-layer graph analytics.
//!
//! ## Modules
//!
//! - [`models`] — `CentralityProfile`, `GraphSummary`, `CommunityPartition` and configs
//! - [`centrality`] — degree, betweenness, closeness, PageRank, clustering, components
//! - [`community`] — deterministic Louvain and modularity
//! - [`summary`] — aggregate layer statistics

pub mod centrality;
pub mod community;
pub mod models;
pub mod summary;

pub use centrality::compute;
pub use community::detect;
pub use models::{
    CentralityProfile, Community, CommunityConfig, CommunityPartition, ComponentInfo,
    GraphSummary, MetricConfig, MetricsResult,
};
pub use summary::summarize;
