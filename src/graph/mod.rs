//! The knowledge-graph artifact: types, builders, validation, and topology
//! metrics.

pub mod metrics;
pub mod types;
pub mod validator;

pub use metrics::{compute_topology_metrics, TopologyMetrics};
pub use types::{build_edge, build_node, Edge, EdgeType, Node, NodeType, Topic};
pub use validator::{validate, ValidationReport};
