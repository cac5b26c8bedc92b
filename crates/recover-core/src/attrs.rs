//! Node and edge attributes carried by the program graph.

use serde::{Deserialize, Serialize};

use crate::ids::Selector;

/// Type of a program-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Invalid,
    Code,
    Data,
}

impl Default for NodeType {
    fn default() -> Self {
        NodeType::Invalid
    }
}

/// Type of a program-graph edge, derived from the node types of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Invalid,
    Code2Code,
    Code2Data,
    Data2Data,
    Data2Code,
}

impl Default for EdgeType {
    fn default() -> Self {
        EdgeType::Invalid
    }
}

/// Class of relationship an edge represents.
///
/// `Sequence` edges are auxiliary scaffolding joining address-consecutive
/// functions within a segment; they must be stripped before fitness scoring
/// (see [`crate::views::SequenceMode`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeClass {
    Invalid,
    ControlRelation,
    DataRelation,
    Sequence,
}

impl Default for EdgeClass {
    fn default() -> Self {
        EdgeClass::Invalid
    }
}

/// Attributes attached to a program-graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    pub node_type: NodeType,
    pub segment: Selector,
    pub name: Option<String>,
}

/// Attributes attached to a program-graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    pub edge_type: EdgeType,
    pub edge_class: EdgeClass,
    pub size: u64,
}
