//! [`ProgramPoint`] and call/loop [`Context`].
//!
//! Grounded on the teacher's `shared::models::cfg::CFGBlock`/`CFGEdge` (typed,
//! name-keyed graph entities) and on the design note calling for "Dynamic
//! dispatch across ProgramPoint kinds: implement as a tagged variant with
//! explicit match arms." Every term-processing site in
//! [`crate::flowfacts::engine::FlowFactEngine`] switches on this enum rather
//! than using dynamic dispatch.

use std::fmt;

/// The target of an [`ProgramPoint::Edge`]: either a named block or the
/// pseudo-sink that represents function exit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockOrExit {
    Block(String),
    Exit,
}

impl fmt::Display for BlockOrExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockOrExit::Block(name) => write!(f, "{name}"),
            BlockOrExit::Exit => write!(f, "Exit"),
        }
    }
}

/// One program point, tagged by kind. Immutable and comparable by its
/// canonical [`ProgramPoint::name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProgramPoint {
    Function(String),
    Block(String),
    Edge(String, BlockOrExit),
    Instruction(String, usize),
    Loop(String),
    Marker(String),
    ConstantProgramPoint(String, i64),
    FrequencyVariable(String),
    GlobalProgramPoint(String),
}

impl ProgramPoint {
    /// The canonical name used for equality, hashing, and ordering, and as
    /// the textual key into [`crate::ilp::store::ConstraintStore`]'s variable
    /// index map.
    pub fn name(&self) -> String {
        match self {
            ProgramPoint::Function(n) => format!("fn:{n}"),
            ProgramPoint::Block(n) => format!("blk:{n}"),
            ProgramPoint::Edge(src, dst) => format!("edge:{src}->{dst}"),
            ProgramPoint::Instruction(blk, idx) => format!("insn:{blk}:{idx}"),
            ProgramPoint::Loop(header) => format!("loop:{header}"),
            ProgramPoint::Marker(n) => format!("marker:{n}"),
            ProgramPoint::ConstantProgramPoint(n, v) => format!("const:{n}={v}"),
            ProgramPoint::FrequencyVariable(n) => format!("freqvar:{n}"),
            ProgramPoint::GlobalProgramPoint(n) => format!("global:{n}"),
        }
    }

    /// True if this point denotes a basic block (used by the flow-fact
    /// translator to decide how to spread a term's factor over edges).
    pub fn is_block(&self) -> bool {
        matches!(self, ProgramPoint::Block(_))
    }

    /// True if this point denotes a function entry.
    pub fn is_function(&self) -> bool {
        matches!(self, ProgramPoint::Function(_))
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One entry in a [`Context`]: a call site entered, or a loop iteration
/// entered. Ordered sequences of these give context-sensitivity without
/// requiring it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextEntry {
    Call(String),
    LoopEntry(String),
}

/// An ordered call/loop-entry context; may be empty (context-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Context(pub Vec<ContextEntry>);

impl Context {
    pub fn empty() -> Self {
        Context(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pushed_call(&self, callsite: impl Into<String>) -> Self {
        let mut entries = self.0.clone();
        entries.push(ContextEntry::Call(callsite.into()));
        Context(entries)
    }
}

/// A program point paired with the context it was referenced under. All
/// flow-fact references carry one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextRef {
    pub point: ProgramPoint,
    pub context: Context,
}

impl ContextRef {
    pub fn new(point: ProgramPoint, context: Context) -> Self {
        Self { point, context }
    }

    /// A context-free reference, the common case.
    pub fn global(point: ProgramPoint) -> Self {
        Self {
            point,
            context: Context::empty(),
        }
    }

    pub fn is_context_sensitive(&self) -> bool {
        !self.context.is_empty()
    }
}
