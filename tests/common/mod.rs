//! Test-only brute-force solver used by the scenario integration tests to
//! get an actual numeric optimum out of a [`ConstraintStore`] without
//! linking a real MILP backend (the crate's own non-goal — see §2's Solver
//! boundary). Small enough constant domains that plain backtracking with
//! early constraint checking finishes in milliseconds for the scenario
//! sizes in spec.md §8.

use wcet_ipet_core::ilp::{ConstraintOp, IlpProblem, SolveOutcome, Solver, VarIndex};
use wcet_ipet_core::CoreError;
use rustc_hash::FxHashMap;

/// Exhaustive search over `0..=bound` per variable (or the problem's own
/// upper bound if tighter), maximizing the cost-weighted sum subject to
/// every active constraint and SOS1 group. Only ever used against the tiny
/// hand-built graphs in these scenario tests.
pub struct BruteForceSolver {
    pub default_bound: i64,
}

impl BruteForceSolver {
    pub fn new(default_bound: i64) -> Self {
        Self { default_bound }
    }
}

impl Solver for BruteForceSolver {
    fn solve_max(&self, problem: &IlpProblem) -> Result<SolveOutcome, CoreError> {
        let n = problem.num_vars;
        let bounds: Vec<i64> = (1..=n)
            .map(|v| problem.upper_bounds.get(&v).copied().unwrap_or(self.default_bound))
            .collect();

        // Group constraints by the largest variable index they reference so
        // a partial assignment can be pruned the moment it's fully decided.
        let mut by_max_var: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
        for (i, c) in problem.constraints.iter().enumerate() {
            let max_v = c.variables().max().unwrap_or(0);
            by_max_var[max_v].push(i);
        }

        let mut assignment = vec![0i64; n + 1];
        let mut best: Option<(i64, FxHashMap<VarIndex, i64>)> = None;

        fn satisfied(c: &wcet_ipet_core::ilp::NormalizedConstraint, assignment: &[i64]) -> bool {
            let sum: i64 = c.variables().map(|v| c.get_coeff(v) * assignment[v]).sum();
            match c.op() {
                ConstraintOp::Equal => sum == c.rhs(),
                ConstraintOp::LessEqual => sum <= c.rhs(),
            }
        }

        fn recurse(
            v: usize,
            n: usize,
            bounds: &[i64],
            by_max_var: &[Vec<usize>],
            problem: &IlpProblem,
            assignment: &mut Vec<i64>,
            best: &mut Option<(i64, FxHashMap<VarIndex, i64>)>,
        ) {
            if v > n {
                for (name, (vars, card)) in problem.sos1_groups.iter().map(|(n, vs, c)| (n, (vs, c))) {
                    let _ = name;
                    let nonzero = vars.iter().filter(|&&idx| assignment[idx] != 0).count();
                    if nonzero > *card {
                        return;
                    }
                }
                let objective: i64 = (1..=n)
                    .map(|idx| problem.cost.get(&idx).copied().unwrap_or(0) * assignment[idx])
                    .sum();
                if best.as_ref().map(|(b, _)| objective > *b).unwrap_or(true) {
                    let freqs: FxHashMap<VarIndex, i64> =
                        (1..=n).map(|idx| (idx, assignment[idx])).collect();
                    *best = Some((objective, freqs));
                }
                return;
            }
            for val in 0..=bounds[v - 1] {
                assignment[v] = val;
                let ok = by_max_var[v].iter().all(|&ci| satisfied(&problem.constraints[ci], assignment));
                if ok {
                    recurse(v + 1, n, bounds, by_max_var, problem, assignment, best);
                }
            }
            assignment[v] = 0;
        }

        recurse(1, n, &bounds, &by_max_var, problem, &mut assignment, &mut best);

        match best {
            Some((objective, frequencies)) => Ok(SolveOutcome { objective, frequencies }),
            None => Err(CoreError::SolverInfeasible(Vec::new())),
        }
    }
}
