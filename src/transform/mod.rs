//! Cross-level constraint transfer (§4.7, §4.8).

pub mod relation_graph;
pub mod symbolic;

pub use relation_graph::RelationGraphTransform;
pub use symbolic::SymbolicBoundTransformation;
