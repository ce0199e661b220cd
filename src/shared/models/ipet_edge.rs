//! [`IpetEdge`]: the typed directed edge shared by CFG, call, relation-graph,
//! and GCFG/SSTG graphs.
//!
//! Grounded on `features/flow_graph/infrastructure/cfg.rs`'s
//! `CFGEdge`/`CFGEdgeType` pair (a struct carrying endpoints plus a
//! categorizing enum), generalized so the same edge type serves all four
//! program-representation graphs this spec names instead of one CFG.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::program_point::{BlockOrExit, ProgramPoint};

/// Program-representation level an edge belongs to.
///
/// `Relation` is this implementation's explicit home for "relation-graph
/// edge" endpoints (§3 lists it as a edge *category*, derived from endpoint
/// types spanning both levels; giving it its own level tag here makes
/// [`IpetEdge::category`] a total, non-overlapping match instead of an
/// inferred heuristic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Bitcode,
    Machinecode,
    Gcfg,
    Relation,
}

/// The endpoint of an edge: a program point, or the pseudo-sink `Exit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeEndpoint {
    Point(ProgramPoint),
    Exit,
}

impl EdgeEndpoint {
    pub fn block(name: impl Into<String>) -> Self {
        EdgeEndpoint::Point(ProgramPoint::Block(name.into()))
    }

    pub fn function(name: impl Into<String>) -> Self {
        EdgeEndpoint::Point(ProgramPoint::Function(name.into()))
    }

    fn name(&self) -> String {
        match self {
            EdgeEndpoint::Point(p) => p.name(),
            EdgeEndpoint::Exit => BlockOrExit::Exit.to_string(),
        }
    }
}

impl fmt::Display for EdgeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The four edge categories, derived from endpoint kinds and level (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeCategory {
    Cfg,
    Call,
    RelationGraph,
    Gcfg,
}

/// A typed directed edge `(source, target, level, power_state?)`.
///
/// Equality and hash are derived from the qualified name
/// `"source<arrow>target||power_state"`, matching §3 exactly, so two edges
/// built independently (e.g. once while building the IPET, once while
/// looking one up by name in [`crate::ilp::store::ConstraintStore`]) compare
/// equal.
#[derive(Debug, Clone)]
pub struct IpetEdge {
    pub source: ProgramPoint,
    pub target: EdgeEndpoint,
    pub level: Level,
    pub power_state: Option<String>,
}

impl IpetEdge {
    pub fn new(source: ProgramPoint, target: EdgeEndpoint, level: Level) -> Self {
        Self {
            source,
            target,
            level,
            power_state: None,
        }
    }

    pub fn with_power_state(mut self, power_state: impl Into<String>) -> Self {
        self.power_state = Some(power_state.into());
        self
    }

    /// The canonical `"source<arrow>target||power_state"` name used as this
    /// edge's [`crate::ilp::store::ConstraintStore`] variable name.
    pub fn qualified_name(&self) -> String {
        match &self.power_state {
            Some(ps) => format!("{}<arrow>{}||{}", self.source.name(), self.target.name(), ps),
            None => format!("{}<arrow>{}", self.source.name(), self.target.name()),
        }
    }

    /// Derive this edge's category from its endpoint kinds and level (§3).
    pub fn category(&self) -> EdgeCategory {
        if matches!(self.source, ProgramPoint::Instruction(..))
            && matches!(&self.target, EdgeEndpoint::Point(ProgramPoint::Function(_)))
        {
            return EdgeCategory::Call;
        }
        match self.level {
            Level::Gcfg => EdgeCategory::Gcfg,
            Level::Relation => EdgeCategory::RelationGraph,
            Level::Bitcode | Level::Machinecode => EdgeCategory::Cfg,
        }
    }
}

impl PartialEq for IpetEdge {
    fn eq(&self, other: &Self) -> bool {
        self.qualified_name() == other.qualified_name()
    }
}
impl Eq for IpetEdge {}

impl Hash for IpetEdge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.qualified_name().hash(state);
    }
}

impl fmt::Display for IpetEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}
