//! The `relation-graph` entity of the external program document (§6): a
//! bipartite correspondence between a bitcode and a machine-code CFG, used
//! by [`crate::transform`] to carry flow facts across levels.

use serde::{Deserialize, Serialize};

use crate::program::function::FunctionLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationEndpoint {
    pub function: String,
    pub level: FunctionLevel,
}

/// The role a [`RelationNode`] plays in the bitcode<->machinecode
/// correspondence, per the LCTES'13 relation-graph node families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationNodeType {
    Entry,
    Exit,
    /// A block that corresponds 1:1 across levels and must preserve flow.
    Progress,
    /// No corresponding block on the other side (pure source-level or
    /// pure compiler-introduced scaffolding).
    Unmapped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationNode {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: RelationNodeType,
    #[serde(default)]
    pub src_block: Option<String>,
    #[serde(default)]
    pub dst_block: Option<String>,
    #[serde(default)]
    pub src_successors: Vec<String>,
    #[serde(default)]
    pub dst_successors: Vec<String>,
}

impl RelationNode {
    pub fn is_progress(&self) -> bool {
        matches!(self.node_type, RelationNodeType::Progress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationGraph {
    pub src: RelationEndpoint,
    pub dst: RelationEndpoint,
    pub nodes: Vec<RelationNode>,
}

impl RelationGraph {
    pub fn node_for_src_block(&self, block: &str) -> Option<&RelationNode> {
        self.nodes
            .iter()
            .find(|n| n.src_block.as_deref() == Some(block))
    }

    pub fn node_for_dst_block(&self, block: &str) -> Option<&RelationNode> {
        self.nodes
            .iter()
            .find(|n| n.dst_block.as_deref() == Some(block))
    }

    pub fn covers_function(&self, function: &str, level: FunctionLevel) -> bool {
        (self.src.function == function && self.src.level == level)
            || (self.dst.function == function && self.dst.level == level)
    }
}
