//! The solver boundary: `ConstraintStore::solve_max` delegates through this
//! trait rather than embedding an LP backend (§2 Solver boundary).
//!
//! Grounded on the teacher's external-collaborator pattern for its own
//! pluggable backends (e.g. the taint analyzer's points-to provider trait);
//! a production build links a real MILP solver crate and implements
//! [`Solver`] over it, which this crate deliberately does not depend on.

use rustc_hash::FxHashMap;

use crate::errors::CoreError;
use crate::ilp::constraint::{NormalizedConstraint, VarIndex};

/// A fully built ILP ready to hand to a solver: the active constraints, the
/// cost vector, and any SOS1 groups.
pub struct IlpProblem<'a> {
    pub num_vars: usize,
    pub constraints: &'a [NormalizedConstraint],
    pub cost: &'a FxHashMap<VarIndex, i64>,
    pub sos1_groups: &'a [(String, Vec<VarIndex>, usize)],
    pub upper_bounds: &'a FxHashMap<VarIndex, i64>,
}

/// A successful solve: the objective value and the variable assignment
/// that achieves it.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub objective: i64,
    pub frequencies: FxHashMap<VarIndex, i64>,
}

/// External MILP backend boundary. `solve_max` maximizes the cost-weighted
/// sum of variables subject to the problem's constraints.
pub trait Solver {
    fn solve_max(&self, problem: &IlpProblem) -> Result<SolveOutcome, CoreError>;
}

/// A solver that always reports an unbounded objective, naming no
/// offending constraints. Exists so `ConstraintStore::diagnose_unbounded`
/// and the `solve_max` error path are exercisable without a real LP
/// backend linked in; never use this to accept a real result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSolver;

impl Solver for NullSolver {
    fn solve_max(&self, _problem: &IlpProblem) -> Result<SolveOutcome, CoreError> {
        Err(CoreError::SolverUnbounded(Vec::new()))
    }
}
