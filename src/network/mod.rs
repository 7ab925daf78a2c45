//! Multi-layer network construction.
//!
//! ## Modules
//!
//! - [`models`] — `Layer`, `LayerGraph` (petgraph wrapper) and `NetworkConfig`
//! - [`text`] — tokenizer, TF-IDF vectors and blocking for the content layer
//! - [`builder`] — `NetworkBuilder`, one independent builder per layer

pub mod builder;
pub mod models;
pub mod text;

pub use builder::{NetworkBuilder, NetworkLayers};
pub use models::{GraphEdge, GraphNode, Layer, LayerGraph, NetworkConfig, NodeKind};
