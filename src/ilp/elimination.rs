//! [`VariableElimination`]: projects the constraint system onto a chosen
//! variable subset by equality substitution and Fourier-Motzkin combination
//! (§4.3).
//!
//! Grounded on the teacher's dataflow worklist/fixpoint solvers (bucket-by-
//! priority pop, recompute-on-drain rather than incremental reindexing) for
//! the ordering structure, generalized from dataflow facts to constraint
//! elimination order.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::AnalysisOptions;
use crate::errors::CoreError;
use crate::ilp::constraint::{ConstraintOp, ConstraintTag, VarIndex};
use crate::ilp::store::ConstraintStore;

pub struct VariableElimination;

impl VariableElimination {
    /// Eliminate every variable in `targets` from `store`, in an order that
    /// prefers equality substitution over Fourier-Motzkin, and within the
    /// equality-eligible set prefers the variable whose substitution touches
    /// the fewest other variables (§4.3 steps 1-2). `options.eliminate_by_unaffected_tiebreak`
    /// controls whether the secondary tiebreak participates in ordering.
    pub fn eliminate(
        store: &mut ConstraintStore,
        targets: &[VarIndex],
        options: &AnalysisOptions,
    ) -> Result<(), CoreError> {
        for &v in targets {
            if store.has_cost(v) {
                return Err(CoreError::EliminatingCostedVariable(
                    store.name_of(v).unwrap_or("?").to_string(),
                ));
            }
        }

        let mut remaining: FxHashSet<VarIndex> = targets.iter().copied().collect();
        while let Some(v) = Self::pick_next(store, &remaining, options) {
            match Self::best_equality_for(store, v, &remaining, options) {
                Some((eq_idx, _, _)) => Self::substitute(store, v, eq_idx)?,
                None => Self::fm_eliminate(store, v),
            }
            remaining.remove(&v);
        }
        Ok(())
    }

    /// The next variable to eliminate: the equality-eligible candidate with
    /// the smallest `(touched, unaffected)` key, or (if none remain has an
    /// equality) the lowest-indexed remaining variable, eliminated by FM.
    fn pick_next(
        store: &ConstraintStore,
        remaining: &FxHashSet<VarIndex>,
        options: &AnalysisOptions,
    ) -> Option<VarIndex> {
        let mut best: Option<(VarIndex, (usize, usize))> = None;
        for &v in remaining {
            if let Some((_, touched, unaffected)) = Self::best_equality_for(store, v, remaining, options) {
                let key = (touched, unaffected);
                let replace = match &best {
                    Some((_, current)) => key < *current,
                    None => true,
                };
                if replace {
                    best = Some((v, key));
                }
            }
        }
        match best {
            Some((v, _)) => Some(v),
            None => remaining.iter().copied().min(),
        }
    }

    /// The active equality constraint mentioning `v` whose substitution
    /// touches the fewest other variables, tiebroken (when
    /// `options.eliminate_by_unaffected_tiebreak` is set) by the fewest of
    /// those that lie outside `remaining` (§4.3 step 2's "fewest
    /// unaffected-variable references"). Returns `(constraint index, touched,
    /// unaffected)`.
    fn best_equality_for(
        store: &ConstraintStore,
        v: VarIndex,
        remaining: &FxHashSet<VarIndex>,
        options: &AnalysisOptions,
    ) -> Option<(usize, usize, usize)> {
        store
            .active_constraint_indices()
            .filter(|&i| {
                let c = store.constraint(i);
                c.is_equality() && c.get_coeff(v) != 0
            })
            .map(|i| {
                let c = store.constraint(i);
                let others: Vec<VarIndex> = c.variables().filter(|&w| w != v).collect();
                let touched = others.len();
                let unaffected = if options.eliminate_by_unaffected_tiebreak {
                    others.iter().filter(|w| !remaining.contains(w)).count()
                } else {
                    0
                };
                (i, touched, unaffected)
            })
            .min_by_key(|&(_, touched, unaffected)| (touched, unaffected))
    }

    /// Substitute `v` out using equation `eq_idx`: `α·v + A = β`. Flips the
    /// equation's sign first if `α < 0` so that inequality direction is
    /// preserved in every combination (§4.3 step 3). Fails loudly rather than
    /// silently discarding an `x = 0` infeasibility annotation (§4.3 step 5).
    fn substitute(store: &mut ConstraintStore, v: VarIndex, eq_idx: usize) -> Result<(), CoreError> {
        let eq = store.constraint(eq_idx).clone();
        if eq.is_zero_equality() {
            return Err(CoreError::EliminatingInfeasibilityAnnotation(
                store.name_of(v).unwrap_or("?").to_string(),
            ));
        }

        let alpha = eq.get_coeff(v);
        let mut a_rest = eq.coeffs().clone();
        a_rest.remove(&v);
        let (alpha_u, a_u, beta_u) = if alpha < 0 {
            for c in a_rest.values_mut() {
                *c = -*c;
            }
            (-alpha, a_rest, -eq.rhs())
        } else {
            (alpha, a_rest, eq.rhs())
        };

        let targets: Vec<usize> = store
            .active_constraint_indices()
            .filter(|&i| i != eq_idx && store.constraint(i).get_coeff(v) != 0)
            .collect();

        for c_idx in targets {
            let c = store.constraint(c_idx).clone();
            let gamma = c.get_coeff(v);
            let op = c.op();
            let tag = store.constraint_tag(c_idx);
            let name = format!(
                "{}__subst_{}",
                store.constraint_name(c_idx),
                store.name_of(v).unwrap_or("?")
            );

            let mut c_rest = c.coeffs().clone();
            c_rest.remove(&v);

            let mut new_coeffs: FxHashMap<VarIndex, i64> = FxHashMap::default();
            for (&w, &coeff) in c_rest.iter() {
                *new_coeffs.entry(w).or_insert(0) += alpha_u * coeff;
            }
            for (&w, &coeff) in a_u.iter() {
                *new_coeffs.entry(w).or_insert(0) -= gamma * coeff;
            }
            let new_rhs = alpha_u * c.rhs() - gamma * beta_u;

            store.add_raw_constraint(new_coeffs, op, new_rhs, &name, tag)?;
            store.retire_constraint(c_idx);
        }

        store.retire_constraint(eq_idx);
        store.mark_eliminated(v);
        Ok(())
    }

    /// FM-eliminate `v` using every active inequality that mentions it:
    /// partition into lower bounds (`λ < 0`) and upper bounds (`µ > 0`) and
    /// emit their cross-product, free of `v` (§4.3 step 4).
    fn fm_eliminate(store: &mut ConstraintStore, v: VarIndex) {
        let refs: Vec<usize> = store
            .active_constraint_indices()
            .filter(|&i| store.constraint(i).get_coeff(v) != 0)
            .collect();

        let mut lowers = Vec::new();
        let mut uppers = Vec::new();
        for i in refs {
            let c = store.constraint(i).clone();
            if c.get_coeff(v) < 0 {
                lowers.push((i, c));
            } else {
                uppers.push((i, c));
            }
        }

        for (li, l) in &lowers {
            for (ui, u) in &uppers {
                let lambda = l.get_coeff(v);
                let mu = u.get_coeff(v);
                let mut l_rest = l.coeffs().clone();
                l_rest.remove(&v);
                let mut u_rest = u.coeffs().clone();
                u_rest.remove(&v);

                let mut new_coeffs: FxHashMap<VarIndex, i64> = FxHashMap::default();
                for (&w, &coeff) in l_rest.iter() {
                    *new_coeffs.entry(w).or_insert(0) += mu * coeff;
                }
                for (&w, &coeff) in u_rest.iter() {
                    *new_coeffs.entry(w).or_insert(0) -= lambda * coeff;
                }
                let new_rhs = mu * l.rhs() - lambda * u.rhs();
                let tag = Self::combine_tag(store.constraint_tag(*li), store.constraint_tag(*ui));
                let name = format!(
                    "{}__fm__{}",
                    store.constraint_name(*li),
                    store.constraint_name(*ui)
                );
                // Tautologies/inconsistencies surface through the normal
                // `build` path; an all-bound-coefficient pair can legitimately
                // normalize to a tautology here, which is not an error.
                let _ = store.add_raw_constraint(new_coeffs, ConstraintOp::LessEqual, new_rhs, &name, tag);
            }
        }

        for (i, _) in lowers.iter().chain(uppers.iter()) {
            store.retire_constraint(*i);
        }
        store.mark_eliminated(v);
    }

    fn combine_tag(a: ConstraintTag, b: ConstraintTag) -> ConstraintTag {
        if a == ConstraintTag::UserFlowFact || b == ConstraintTag::UserFlowFact {
            ConstraintTag::UserFlowFact
        } else {
            ConstraintTag::Structural
        }
    }
}
