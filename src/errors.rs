//! Crate-wide error type.
//!
//! Mirrors the fatal kinds from the error-handling design. The non-fatal
//! "warn and skip" kinds (`SymbolicBoundUntranslatable`, ignored unknown
//! references during flow-fact import) are instead accumulated into
//! [`crate::config::AnalysisStats`] by the callers that encounter them.

use thiserror::Error;

/// Fatal error conditions raised while building or manipulating the ILP.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A constraint referenced a variable that was never added to the store.
    #[error("unknown variable referenced by constraint '{constraint}': {var}")]
    UnknownVariable { constraint: String, var: String },

    /// A variable was added twice.
    #[error("variable already exists: {0}")]
    DuplicateVariable(String),

    /// Normalization proved the constraint system infeasible.
    #[error("inconsistent constraint '{name}': {detail}")]
    InconsistentConstraint { name: String, detail: String },

    /// A callsite has neither a static nor a refined target set.
    #[error("unresolved indirect call at {0}")]
    UnresolvedIndirectCall(String),

    /// The LP solve produced an unbounded result even after diagnosis.
    #[error("solver reported unbounded objective; offending constraints: {0:?}")]
    SolverUnbounded(Vec<String>),

    /// The LP solve produced an infeasible result even after diagnosis.
    #[error("solver reported infeasible problem; offending constraints: {0:?}")]
    SolverInfeasible(Vec<String>),

    /// Elimination was asked to remove a variable that carries non-zero cost.
    #[error("cannot eliminate variable '{0}' because it carries non-zero cost")]
    EliminatingCostedVariable(String),

    /// Elimination would have discarded an explicit infeasibility annotation.
    #[error("refusing to eliminate infeasibility annotation '{0}' (x = 0 from explicit origin)")]
    EliminatingInfeasibilityAnnotation(String),

    /// No relation graph is available to translate a function across levels.
    #[error("no relation graph available for function '{0}'")]
    MissingRelationGraph(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
