//! [`ConstraintStore`]: owns variables, constraints, costs, and SOS1 groups
//! for one analysis run (§3, §4.2).
//!
//! Grounded on `features/taint_analysis/infrastructure/worklist_solver.rs`'s
//! single-owner fact/constraint store with a stable index map, generalized
//! from dataflow facts to ILP variables and linear constraints.

use std::collections::HashSet;

use rustc_hash::FxHashMap;

use crate::errors::CoreError;
use crate::ilp::constraint::{
    ConstraintKey, ConstraintOp, ConstraintOutcome, ConstraintTag, NormalizedConstraint, VarIndex,
};
use crate::ilp::solver::{IlpProblem, SolveOutcome, Solver};
use crate::shared::models::Level;

/// What happened when a candidate constraint was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Dropped silently: an always-true relation (§3, §4.1).
    Tautology,
    /// Dropped silently: an existing constraint already has the same
    /// canonical key (§3 "deduplicated by canonical key").
    Deduplicated,
}

#[derive(Default)]
pub struct ConstraintStore {
    index: FxHashMap<String, VarIndex>,
    names: Vec<String>,
    levels: Vec<Level>,
    eliminated: Vec<bool>,
    upper_bounds: FxHashMap<VarIndex, i64>,
    cost: FxHashMap<VarIndex, i64>,
    constraints: Vec<NormalizedConstraint>,
    constraint_names: Vec<String>,
    constraint_tags: Vec<ConstraintTag>,
    garbage: Vec<bool>,
    keys: HashSet<ConstraintKey>,
    sos1_groups: FxHashMap<String, (Vec<VarIndex>, usize)>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, failing on duplicate. Emits its non-negativity bound
    /// `-v ≤ 0` immediately, and `v ≤ upper` if bounded (§4.2).
    pub fn add_variable(
        &mut self,
        name: &str,
        level: Level,
        upper: Option<i64>,
    ) -> Result<VarIndex, CoreError> {
        if self.index.contains_key(name) {
            return Err(CoreError::DuplicateVariable(name.to_string()));
        }
        let idx = self.names.len() + 1;
        self.index.insert(name.to_string(), idx);
        self.names.push(name.to_string());
        self.levels.push(level);
        self.eliminated.push(false);

        let mut nonneg = FxHashMap::default();
        nonneg.insert(idx, -1);
        self.add_raw_constraint(
            nonneg,
            ConstraintOp::LessEqual,
            0,
            &format!("{name}__nonneg"),
            ConstraintTag::Positivity,
        )?;

        if let Some(u) = upper {
            self.upper_bounds.insert(idx, u);
            let mut bound = FxHashMap::default();
            bound.insert(idx, 1);
            self.add_raw_constraint(
                bound,
                ConstraintOp::LessEqual,
                u,
                &format!("{name}__upper"),
                ConstraintTag::Positivity,
            )?;
        }

        Ok(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<VarIndex> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, v: VarIndex) -> Option<&str> {
        self.names.get(v - 1).map(String::as_str)
    }

    pub fn level_of(&self, v: VarIndex) -> Option<Level> {
        self.levels.get(v - 1).copied()
    }

    pub fn num_variables(&self) -> usize {
        self.names.len()
    }

    pub fn is_eliminated(&self, v: VarIndex) -> bool {
        self.eliminated.get(v - 1).copied().unwrap_or(false)
    }

    pub fn mark_eliminated(&mut self, v: VarIndex) {
        if let Some(slot) = self.eliminated.get_mut(v - 1) {
            *slot = true;
        }
    }

    pub fn has_cost(&self, v: VarIndex) -> bool {
        self.cost.get(&v).is_some_and(|&c| c != 0)
    }

    /// Resolve named terms to indices and add the constraint; fails with
    /// [`CoreError::UnknownVariable`] if any name was never added (§4.2).
    pub fn add_constraint(
        &mut self,
        lhs_named: &[(&str, i64)],
        op: ConstraintOp,
        rhs: i64,
        name: &str,
        tag: ConstraintTag,
    ) -> Result<AddOutcome, CoreError> {
        let mut coeffs = FxHashMap::default();
        for (var_name, coeff) in lhs_named {
            let idx = self.index.get(*var_name).copied().ok_or_else(|| {
                CoreError::UnknownVariable {
                    constraint: name.to_string(),
                    var: var_name.to_string(),
                }
            })?;
            *coeffs.entry(idx).or_insert(0) += coeff;
        }
        self.add_raw_constraint(coeffs, op, rhs, name, tag)
    }

    /// Add a constraint whose LHS is already index-keyed. Used internally
    /// (and by [`crate::ilp::elimination::VariableElimination`]) to install
    /// a constraint derived by combination rather than by name lookup.
    pub(crate) fn add_raw_constraint(
        &mut self,
        coeffs: FxHashMap<VarIndex, i64>,
        op: ConstraintOp,
        rhs: i64,
        name: &str,
        tag: ConstraintTag,
    ) -> Result<AddOutcome, CoreError> {
        match NormalizedConstraint::build(coeffs, op, rhs, name)? {
            ConstraintOutcome::Tautology => Ok(AddOutcome::Tautology),
            ConstraintOutcome::Constraint(c) => {
                let key = c.key();
                if self.keys.contains(&key) {
                    return Ok(AddOutcome::Deduplicated);
                }
                self.keys.insert(key);
                self.constraints.push(c);
                self.constraint_names.push(name.to_string());
                self.constraint_tags.push(tag);
                self.garbage.push(false);
                Ok(AddOutcome::Added)
            }
        }
    }

    /// Introduce `cardinality`-of-1 SOS1 variables under `name`, creating
    /// each named variable as it goes (§4.2, §4.5 interrupt correction).
    pub fn add_sos1(
        &mut self,
        name: &str,
        var_names: &[String],
        level: Level,
        cardinality: usize,
    ) -> Result<Vec<VarIndex>, CoreError> {
        let mut idxs = Vec::with_capacity(var_names.len());
        for vn in var_names {
            idxs.push(self.add_variable(vn, level, None)?);
        }
        self.sos1_groups
            .insert(name.to_string(), (idxs.clone(), cardinality));
        Ok(idxs)
    }

    pub fn add_cost(&mut self, v: VarIndex, c: i64) {
        *self.cost.entry(v).or_insert(0) += c;
    }

    pub fn cost_of(&self, v: VarIndex) -> i64 {
        self.cost.get(&v).copied().unwrap_or(0)
    }

    /// Indices of constraints still in force (not retired by elimination).
    pub fn active_constraint_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.constraints.len()).filter(move |&i| !self.garbage[i])
    }

    pub fn constraint(&self, i: usize) -> &NormalizedConstraint {
        &self.constraints[i]
    }

    pub fn constraint_name(&self, i: usize) -> &str {
        &self.constraint_names[i]
    }

    pub fn constraint_tag(&self, i: usize) -> ConstraintTag {
        self.constraint_tags[i]
    }

    /// Mark constraint `i` as garbage. Elimination calls this for every
    /// constraint it folds into combinations, per §3's "eliminating a
    /// variable marks old constraints garbage and creates new ones."
    pub fn retire_constraint(&mut self, i: usize) {
        self.garbage[i] = true;
    }

    pub fn sos1_groups(&self) -> impl Iterator<Item = (&str, &[VarIndex], usize)> {
        self.sos1_groups
            .iter()
            .map(|(name, (vars, card))| (name.as_str(), vars.as_slice(), *card))
    }

    /// Defer to an external solver, tracking only active constraints.
    pub fn solve_max(&self, solver: &dyn Solver) -> Result<SolveOutcome, CoreError> {
        let active: Vec<NormalizedConstraint> = self
            .active_constraint_indices()
            .map(|i| self.constraints[i].clone())
            .collect();
        let sos1: Vec<(String, Vec<VarIndex>, usize)> = self
            .sos1_groups
            .iter()
            .map(|(name, (vars, card))| (name.clone(), vars.clone(), *card))
            .collect();
        let problem = IlpProblem {
            num_vars: self.names.len(),
            constraints: &active,
            cost: &self.cost,
            sos1_groups: &sos1,
            upper_bounds: &self.upper_bounds,
        };
        solver.solve_max(&problem)
    }

    /// After an unbounded solve, bound every variable still lacking an
    /// explicit upper bound at `big_m`, returning the variable names this
    /// touched so the caller can report which bounds were synthetic (§4.2).
    pub fn diagnose_unbounded(&mut self, big_m: i64) -> Vec<String> {
        let mut bounded = Vec::new();
        for idx in 1..=self.names.len() {
            if !self.upper_bounds.contains_key(&idx) {
                self.upper_bounds.insert(idx, big_m);
                bounded.push(self.names[idx - 1].clone());
            }
        }
        bounded
    }

    /// After an infeasible solve, name every non-structural `≤` constraint
    /// as a candidate to relax, the targeted diagnostic subset described in
    /// §4.2 (this crate does not itself add slack variables and re-solve —
    /// that is the caller's retry policy, per §7's "the engine propagates
    /// fatal errors to the orchestrator, which may retry with relaxed
    /// settings").
    pub fn diagnose_infeasible(&self) -> Vec<String> {
        self.active_constraint_indices()
            .filter(|&i| {
                !self.constraint_tags[i].is_structural_or_positivity()
                    && matches!(self.constraints[i].op(), ConstraintOp::LessEqual)
            })
            .map(|i| self.constraint_names[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ilp::solver::NullSolver;

    #[test]
    fn add_variable_emits_nonneg_bound() {
        let mut store = ConstraintStore::new();
        let idx = store.add_variable("x", Level::Bitcode, None).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(store.active_constraint_indices().count(), 1);
    }

    #[test]
    fn duplicate_variable_is_an_error() {
        let mut store = ConstraintStore::new();
        store.add_variable("x", Level::Bitcode, None).unwrap();
        let err = store.add_variable("x", Level::Bitcode, None).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateVariable(_)));
    }

    #[test]
    fn add_constraint_resolves_names_and_dedups() {
        let mut store = ConstraintStore::new();
        store.add_variable("a", Level::Machinecode, None).unwrap();
        store.add_variable("b", Level::Machinecode, None).unwrap();

        let first = store
            .add_constraint(
                &[("a", 1), ("b", -1)],
                ConstraintOp::LessEqual,
                5,
                "c1",
                ConstraintTag::UserFlowFact,
            )
            .unwrap();
        assert_eq!(first, AddOutcome::Added);

        let dup = store
            .add_constraint(
                &[("b", -1), ("a", 1)],
                ConstraintOp::LessEqual,
                5,
                "c1_dup",
                ConstraintTag::UserFlowFact,
            )
            .unwrap();
        assert_eq!(dup, AddOutcome::Deduplicated);
    }

    #[test]
    fn unknown_variable_reference_is_an_error() {
        let mut store = ConstraintStore::new();
        let err = store
            .add_constraint(
                &[("ghost", 1)],
                ConstraintOp::LessEqual,
                1,
                "c",
                ConstraintTag::UserFlowFact,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownVariable { .. }));
    }

    #[test]
    fn tautology_is_dropped_silently() {
        let mut store = ConstraintStore::new();
        store.add_variable("a", Level::Bitcode, None).unwrap();
        let outcome = store
            .add_constraint(&[("a", 0)], ConstraintOp::LessEqual, 3, "c", ConstraintTag::UserFlowFact)
            .unwrap();
        assert_eq!(outcome, AddOutcome::Tautology);
    }

    #[test]
    fn sos1_group_creates_its_variables() {
        let mut store = ConstraintStore::new();
        let idxs = store
            .add_sos1(
                "irq_pair",
                &["pos".to_string(), "neg".to_string()],
                Level::Gcfg,
                1,
            )
            .unwrap();
        assert_eq!(idxs.len(), 2);
        assert_eq!(store.sos1_groups().count(), 1);
    }

    #[test]
    fn solve_max_delegates_to_solver() {
        let store = ConstraintStore::new();
        let err = store.solve_max(&NullSolver).unwrap_err();
        assert!(matches!(err, CoreError::SolverUnbounded(_)));
    }

    #[test]
    fn diagnose_unbounded_bounds_every_unbounded_variable() {
        let mut store = ConstraintStore::new();
        store.add_variable("a", Level::Bitcode, None).unwrap();
        store.add_variable("b", Level::Bitcode, Some(10)).unwrap();
        let touched = store.diagnose_unbounded(1_000_000);
        assert_eq!(touched, vec!["a".to_string()]);
    }
}
