//! The `flow-fact` entity of the external program document (§6) and its
//! conversion into this crate's internal [`ProgramPoint`]/[`ContextRef`]
//! model (§4.6 FlowFactEngine).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::program::function::FunctionLevel;
use crate::shared::models::{BlockOrExit, Context, ContextEntry, ContextRef, ProgramPoint};

/// Wire form of a [`ProgramPoint`], tagged by `kind` so the external
/// document can name any of the nine point kinds (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgramPointSpec {
    Function { name: String },
    Block { name: String },
    Edge { source: String, target: String },
    Instruction { block: String, index: usize },
    Loop { header: String },
    Marker { name: String },
    ConstantProgramPoint { name: String, value: i64 },
    FrequencyVariable { name: String },
    GlobalProgramPoint { name: String },
}

impl ProgramPointSpec {
    pub fn to_program_point(&self) -> ProgramPoint {
        match self {
            ProgramPointSpec::Function { name } => ProgramPoint::Function(name.clone()),
            ProgramPointSpec::Block { name } => ProgramPoint::Block(name.clone()),
            ProgramPointSpec::Edge { source, target } => {
                let target = if target == "Exit" {
                    BlockOrExit::Exit
                } else {
                    BlockOrExit::Block(target.clone())
                };
                ProgramPoint::Edge(source.clone(), target)
            }
            ProgramPointSpec::Instruction { block, index } => {
                ProgramPoint::Instruction(block.clone(), *index)
            }
            ProgramPointSpec::Loop { header } => ProgramPoint::Loop(header.clone()),
            ProgramPointSpec::Marker { name } => ProgramPoint::Marker(name.clone()),
            ProgramPointSpec::ConstantProgramPoint { name, value } => {
                ProgramPoint::ConstantProgramPoint(name.clone(), *value)
            }
            ProgramPointSpec::FrequencyVariable { name } => {
                ProgramPoint::FrequencyVariable(name.clone())
            }
            ProgramPointSpec::GlobalProgramPoint { name } => {
                ProgramPoint::GlobalProgramPoint(name.clone())
            }
        }
    }
}

/// Wire form of a [`ContextEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextEntrySpec {
    Call { callsite: String },
    LoopEntry { header: String },
}

impl ContextEntrySpec {
    pub fn to_context_entry(&self) -> ContextEntry {
        match self {
            ContextEntrySpec::Call { callsite } => ContextEntry::Call(callsite.clone()),
            ContextEntrySpec::LoopEntry { header } => ContextEntry::LoopEntry(header.clone()),
        }
    }
}

/// Wire form of a [`ContextRef`]: a program point plus its (possibly empty)
/// context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSpec {
    pub point: ProgramPointSpec,
    #[serde(default)]
    pub context: Vec<ContextEntrySpec>,
}

impl ScopeSpec {
    pub fn to_context_ref(&self) -> ContextRef {
        ContextRef::new(
            self.point.to_program_point(),
            Context(self.context.iter().map(|c| c.to_context_entry()).collect()),
        )
    }
}

/// A term `factor * freq(program_point)` on a flow fact's LHS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub factor: f64,
    pub program_point: ProgramPointSpec,
}

/// The relational/temporal operator of a flow fact (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowFactOp {
    Equal,
    LessEqual,
    MaximalInterarrivalTime,
    MinimalInterarrivalTime,
}

/// The RHS of a flow fact: either a resolved constant or an unresolved
/// symbolic expression that cannot be carried through Fourier-Motzkin
/// (§4.8, §9 Open Questions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RhsExpr {
    Constant(f64),
    Symbolic(String),
}

impl RhsExpr {
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            RhsExpr::Constant(v) => Some(*v),
            RhsExpr::Symbolic(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowFact {
    pub scope: ScopeSpec,
    pub lhs: Vec<Term>,
    pub op: FlowFactOp,
    pub rhs: RhsExpr,
    pub level: FunctionLevel,
    pub origin: String,
    #[serde(flatten, default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}
