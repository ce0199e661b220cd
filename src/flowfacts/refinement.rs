//! [`ControlFlowRefinement`]: dead-block and calltarget-restriction
//! propagation derived from globally-valid flow facts (§4.6 "Refinement").
//!
//! Grounded on `features/taint_analysis/infrastructure/worklist_solver.rs`'s
//! iterative worklist-over-node-ids pattern (§9: "implement as an iterative
//! worklist over block indices; never recurse"), generalized from dataflow
//! fact propagation to infeasibility propagation.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::AnalysisStats;
use crate::program::{FlowFact, FlowFactOp, Function, FunctionLevel, ProgramPointSpec, RhsExpr};

/// A callsite identity independent of its owning function: the external
/// schema names a block and an instruction index but not a function (§6),
/// so restriction and infeasibility facts apply to every function whose
/// blocks match by name.
type CallsiteKey = (String, usize);

#[derive(Debug, Default)]
pub struct ControlFlowRefinement {
    infeasible_blocks: FxHashSet<String>,
    resolved_callees: FxHashMap<CallsiteKey, FxHashSet<String>>,
}

impl ControlFlowRefinement {
    pub fn is_infeasible(&self, block: &str) -> bool {
        self.infeasible_blocks.contains(block)
    }

    pub fn mark_infeasible(&mut self, block: &str) -> bool {
        self.infeasible_blocks.insert(block.to_string())
    }

    pub fn resolved_callees(&self, block: &str, index: usize) -> Option<&FxHashSet<String>> {
        self.resolved_callees.get(&(block.to_string(), index))
    }

    /// Scan `flow_facts` for the two globally-valid refinement shapes (§4.6):
    /// a block-frequency-0 equality marks that block infeasible; a
    /// `callsite - Σ targets ≤ 0` inequality scoped at the entry function
    /// (empty context) restricts that callsite's target set. Context-
    /// sensitive candidates are skipped and counted rather than applied,
    /// since refinement here is context-free (§1 "enabling but not
    /// requiring context-sensitive refinement").
    pub fn derive(
        flow_facts: &[FlowFact],
        entry_function: &str,
        level: FunctionLevel,
        stats: &mut AnalysisStats,
    ) -> Self {
        let mut refinement = Self::default();
        for ff in flow_facts {
            if ff.level != level {
                continue;
            }
            if !ff.scope.context.is_empty() {
                stats.context_sensitive_scopes_skipped += 1;
                continue;
            }

            if let ProgramPointSpec::Block { name } = &ff.scope.point {
                if ff.op == FlowFactOp::Equal
                    && matches!(ff.rhs, RhsExpr::Constant(v) if v == 0.0)
                {
                    refinement.mark_infeasible(name);
                    continue;
                }
            }

            if let ProgramPointSpec::Function { name } = &ff.scope.point {
                if name != entry_function {
                    continue;
                }
                if ff.op != FlowFactOp::LessEqual
                    || !matches!(ff.rhs, RhsExpr::Constant(v) if v == 0.0)
                {
                    continue;
                }
                let mut callsite: Option<(String, usize)> = None;
                let mut targets: FxHashSet<String> = FxHashSet::default();
                let mut recognized = true;
                for term in &ff.lhs {
                    match &term.program_point {
                        ProgramPointSpec::Instruction { block, index } if term.factor > 0.0 => {
                            callsite = Some((block.clone(), *index));
                        }
                        ProgramPointSpec::Function { name } if term.factor < 0.0 => {
                            targets.insert(name.clone());
                        }
                        _ => {
                            recognized = false;
                            break;
                        }
                    }
                }
                if recognized {
                    if let Some(key) = callsite {
                        if !targets.is_empty() {
                            refinement.resolved_callees.insert(key, targets);
                        }
                    }
                }
            }
        }
        refinement
    }

    /// True if `block` is the target of some back-edge within `function`,
    /// i.e. some other block in the function is a member of the loop
    /// headed by `block` (§9's "b is not a back-edge target" guard: loop
    /// headers are excluded from the predecessor/successor majority rule
    /// below, since a header can remain reachable purely through its own
    /// back edge while forward predecessors are transiently infeasible).
    fn is_back_edge_target(function: &Function, block: &str) -> bool {
        function
            .blocks
            .iter()
            .any(|b| b.loops.iter().any(|h| h == block))
    }

    /// Propagate infeasibility to a fixpoint (§4.6, §8 property 6, scenario
    /// E): if every predecessor (resp. successor) of a non-header block is
    /// infeasible, mark it infeasible too. Never recurses; iterates a
    /// worklist over the function's own block list until no more blocks
    /// change.
    pub fn propagate(&mut self, functions: &[Function]) {
        loop {
            let mut changed = false;
            for f in functions {
                for b in &f.blocks {
                    if self.is_infeasible(&b.name) {
                        continue;
                    }
                    if Self::is_back_edge_target(f, &b.name) {
                        continue;
                    }
                    let preds_all_infeasible = !b.predecessors.is_empty()
                        && b.predecessors.iter().all(|p| self.is_infeasible(p));
                    let succs_all_infeasible = !b.successors.is_empty()
                        && b.successors.iter().all(|s| self.is_infeasible(s));
                    if preds_all_infeasible || succs_all_infeasible {
                        changed |= self.mark_infeasible(&b.name);
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }
}
