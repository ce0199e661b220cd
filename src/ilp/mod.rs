//! The ILP layer: normalized constraints, the constraint store, variable
//! elimination, and the external solver boundary (§3, §4.1-§4.3).

pub mod constraint;
pub mod elimination;
pub mod solver;
pub mod store;

pub use constraint::{ConstraintOp, ConstraintOutcome, ConstraintTag, NormalizedConstraint, VarIndex};
pub use elimination::VariableElimination;
pub use solver::{IlpProblem, NullSolver, SolveOutcome, Solver};
pub use store::{AddOutcome, ConstraintStore};
