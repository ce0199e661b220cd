//! The external program-information document the core consumes and
//! produces (§6 EXTERNAL INTERFACES). These types are the serde contract;
//! everything downstream converts them into the internal models under
//! [`crate::shared::models`].

mod flow_fact;
mod function;
mod relation_graph;
mod sstg_input;
mod timing;

pub use flow_fact::{
    ContextEntrySpec, FlowFact, FlowFactOp, ProgramPointSpec, RhsExpr, ScopeSpec, Term,
};
pub use function::{Block, Function, FunctionLevel, Instruction};
pub use relation_graph::{RelationEndpoint, RelationGraph, RelationNode, RelationNodeType};
pub use sstg_input::{DeviceInput, SstgInput, SstgNodeInput, SuccessorsSpec};
pub use timing::{ProfileEntry, TimingEntry};

use serde::{Deserialize, Serialize};

/// The complete in-memory program-information document: every function,
/// every relation graph linking levels, the user's flow facts, and an
/// optional SSTG for cross-task composition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramInfo {
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub relation_graphs: Vec<RelationGraph>,
    #[serde(default)]
    pub flow_facts: Vec<FlowFact>,
    #[serde(default)]
    pub sstg: Option<SstgInput>,
}

impl ProgramInfo {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn functions_at(&self, level: FunctionLevel) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(move |f| f.level == level)
    }

    /// The relation graph covering `function` at `level`, if any (used by
    /// `transform` to decide `MissingRelationGraph` skips, §7).
    pub fn relation_graph_for(&self, function: &str, level: FunctionLevel) -> Option<&RelationGraph> {
        self.relation_graphs
            .iter()
            .find(|rg| rg.covers_function(function, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_lookup_by_name() {
        let info = ProgramInfo {
            functions: vec![Function {
                name: "main".into(),
                level: FunctionLevel::Bitcode,
                blocks: vec![],
                linkage: "external".into(),
            }],
            ..Default::default()
        };
        assert!(info.function("main").is_some());
        assert!(info.function("nope").is_none());
    }

    #[test]
    fn missing_relation_graph_is_reported_as_none() {
        let info = ProgramInfo::default();
        assert!(info.relation_graph_for("main", FunctionLevel::Bitcode).is_none());
    }
}
