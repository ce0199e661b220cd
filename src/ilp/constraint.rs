//! [`NormalizedConstraint`]: the canonical representation of one linear
//! relation over indexed variables (§3, §4.1).
//!
//! Grounded on `features/taint_analysis/infrastructure/worklist_solver.rs`'s
//! sparse integer-indexed term maps, and on
//! `examples/other_examples/016b76bb_mdcpepper-lattice__src-solvers-ilp-state.rs.rs`
//! for the shape of a named linear constraint over an ILP variable index.

use rustc_hash::FxHashMap;

use crate::errors::CoreError;

/// A 1-based index into [`crate::ilp::store::ConstraintStore`]'s variable
/// table.
pub type VarIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Equal,
    LessEqual,
}

/// The canonical dedup key: `(sorted-coeff-map, is-equality, rhs)` (§3).
pub type ConstraintKey = (Vec<(VarIndex, i64)>, bool, i64);

/// A tag classifying why a constraint exists, used by
/// [`crate::flowfacts::engine::FlowFactEngine::extract`] to decide which
/// surviving constraints are worth turning back into flow facts (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintTag {
    /// Flow conservation, entry-sum, or other graph-structural constraint.
    Structural,
    /// A non-negativity bound emitted automatically by `add_variable`.
    Positivity,
    /// A constraint translated from a user-supplied flow fact.
    UserFlowFact,
    /// One leg of a SOS1 group.
    Sos1,
}

impl ConstraintTag {
    /// True for tags that `extract` (§4.6) always skips regardless of the
    /// constraint's shape.
    pub fn is_structural_or_positivity(&self) -> bool {
        matches!(self, ConstraintTag::Structural | ConstraintTag::Positivity)
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// The result of normalizing a candidate constraint: either a usable
/// [`NormalizedConstraint`], or a tautology that the caller should drop
/// silently (§9's "return a result variant `Ok | Tautology | Inconsistent`").
pub enum ConstraintOutcome {
    Constraint(NormalizedConstraint),
    Tautology,
}

/// One normalized linear relation `Σ coeff_i * x_i <op> rhs`.
///
/// Coefficients are non-zero integers and `gcd({coeffs} ∪ {rhs}) = 1` by
/// construction; the only way to build one is through [`NormalizedConstraint::build`],
/// which enforces both invariants and classifies the empty-LHS cases.
#[derive(Debug, Clone)]
pub struct NormalizedConstraint {
    coeffs: FxHashMap<VarIndex, i64>,
    op: ConstraintOp,
    rhs: i64,
}

impl NormalizedConstraint {
    /// Normalize `coeffs <op> rhs` into a constraint, a tautology, or a
    /// fatal [`CoreError::InconsistentConstraint`] (§4.1). `name` is used
    /// only to label the error.
    pub fn build(
        mut coeffs: FxHashMap<VarIndex, i64>,
        op: ConstraintOp,
        mut rhs: i64,
        name: &str,
    ) -> Result<ConstraintOutcome, CoreError> {
        coeffs.retain(|_, c| *c != 0);

        if coeffs.is_empty() {
            return match op {
                ConstraintOp::LessEqual if rhs >= 0 => Ok(ConstraintOutcome::Tautology),
                ConstraintOp::Equal if rhs == 0 => Ok(ConstraintOutcome::Tautology),
                _ => Err(CoreError::InconsistentConstraint {
                    name: name.to_string(),
                    detail: format!("empty LHS with rhs = {rhs}"),
                }),
            };
        }

        let g = coeffs
            .values()
            .fold(rhs.abs(), |acc, &c| gcd(acc, c.abs()));
        let g = if g == 0 { 1 } else { g };
        if g > 1 {
            for c in coeffs.values_mut() {
                *c /= g;
            }
            rhs /= g;
        }

        Ok(ConstraintOutcome::Constraint(NormalizedConstraint {
            coeffs,
            op,
            rhs,
        }))
    }

    pub fn op(&self) -> ConstraintOp {
        self.op
    }

    pub fn rhs(&self) -> i64 {
        self.rhs
    }

    pub fn is_equality(&self) -> bool {
        matches!(self.op, ConstraintOp::Equal)
    }

    pub fn get_coeff(&self, v: VarIndex) -> i64 {
        *self.coeffs.get(&v).unwrap_or(&0)
    }

    pub fn coeffs(&self) -> &FxHashMap<VarIndex, i64> {
        &self.coeffs
    }

    pub fn variables(&self) -> impl Iterator<Item = VarIndex> + '_ {
        self.coeffs.keys().copied()
    }

    /// The canonical dedup key. Two constraints built independently from
    /// equal terms produce equal keys (§3 invariant).
    pub fn key(&self) -> ConstraintKey {
        let mut sorted: Vec<(VarIndex, i64)> = self.coeffs.iter().map(|(&k, &v)| (k, v)).collect();
        sorted.sort_by_key(|(k, _)| *k);
        (sorted, self.is_equality(), self.rhs)
    }

    /// A single-variable constraint with rhs 0 and coefficient ±1 — a pure
    /// non-negativity/non-positivity bound rather than a substantive
    /// relation (§3 invariant).
    pub fn is_pure_bound(&self) -> bool {
        self.coeffs.len() == 1 && self.rhs == 0 && self.coeffs.values().all(|&c| c == 1 || c == -1)
    }

    /// A single-variable equality with rhs 0: `x = 0` (§3 invariant), the
    /// shape an infeasibility annotation takes.
    pub fn is_zero_equality(&self) -> bool {
        self.is_equality() && self.coeffs.len() == 1 && self.rhs == 0
    }

    /// `Σ a_i x_i ≤ 0` with every `a_i ≤ 0`: trivially true given the
    /// variables' non-negativity bounds, so extraction (§4.6) skips it.
    pub fn is_pure_positivity(&self) -> bool {
        matches!(self.op, ConstraintOp::LessEqual)
            && self.rhs == 0
            && self.coeffs.values().all(|&c| c <= 0)
    }
}
