//! Hierarchical Navigable Small World graph index (spec §4.2, §4.3).

pub mod graph;
pub mod layer;
pub mod params;

pub use graph::HnswIndex;
pub use layer::NodeId;
pub use params::{DelaunayType, HnswParams, PostProcessing};
