//! [`IpetModel`]: per-level builder of edge variables, block-flow
//! constraints, callsite/call-edge constraints, and the reachability
//! fixpoint (§4.4).
//!
//! Grounded on `features/flow_graph/infrastructure/cfg.rs` (successor/edge
//! construction over named blocks) and
//! `features/taint_analysis/infrastructure/interprocedural/call_graph.rs`
//! (a `CallGraphProvider`-shaped reachability fixpoint), generalized from a
//! single intraprocedural CFG to a function set with call edges and a
//! refinement-aware frequency model.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::CoreError;
use crate::flowfacts::refinement::ControlFlowRefinement;
use crate::ilp::constraint::{ConstraintOp, ConstraintTag, VarIndex};
use crate::ilp::store::ConstraintStore;
use crate::ipet::cost::CostFn;
use crate::program::{Block, Function, Instruction};
use crate::shared::models::{EdgeEndpoint, IpetEdge, Level, ProgramPoint};

/// What a single [`IpetModel::build`] call produced: every reachable
/// function, and every edge it created (so the caller can attach costs and
/// later iterate edges for extraction/elimination targets).
pub struct IpetModelResult {
    pub reachable_functions: Vec<String>,
    pub edges: Vec<(IpetEdge, VarIndex)>,
}

pub struct IpetModel;

impl IpetModel {
    /// Resolve a callsite instruction's effective target set: the
    /// intersection of its static callees and the refinement's resolved
    /// set when both are known, one or the other when only one is known
    /// (§4.4 "add the intersection of static and refined target sets").
    fn resolve_targets(
        function: &str,
        block: &str,
        instr: &Instruction,
        refinement: &ControlFlowRefinement,
    ) -> Result<Vec<String>, CoreError> {
        let static_targets = instr.callees.clone().unwrap_or_default();
        let refined = refinement.resolved_callees(block, instr.index);

        let targets: Vec<String> = match refined {
            Some(r) if !static_targets.is_empty() => {
                static_targets.into_iter().filter(|t| r.contains(t)).collect()
            }
            Some(r) => r.iter().cloned().collect(),
            None => static_targets,
        };

        if targets.is_empty() {
            return Err(CoreError::UnresolvedIndirectCall(format!(
                "{function}::{block}:{}",
                instr.index
            )));
        }
        Ok(targets)
    }

    /// Discover functions reachable from `entry_function` by a fixpoint
    /// over non-infeasible callsites (§4.4 "Reachability"). Ignores
    /// callsites in blocks the refinement marked infeasible; a genuinely
    /// unresolved indirect call in a reachable, feasible block is fatal.
    pub fn compute_reachable_functions(
        functions: &[Function],
        entry_function: &str,
        refinement: &ControlFlowRefinement,
    ) -> Result<Vec<String>, CoreError> {
        let by_name: FxHashMap<&str, &Function> =
            functions.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut reachable: FxHashSet<String> = FxHashSet::default();
        let mut worklist = vec![entry_function.to_string()];
        reachable.insert(entry_function.to_string());

        while let Some(fname) = worklist.pop() {
            let Some(f) = by_name.get(fname.as_str()) else {
                continue;
            };
            for b in &f.blocks {
                if refinement.is_infeasible(&b.name) {
                    continue;
                }
                for instr in &b.instructions {
                    if !instr.is_call() {
                        continue;
                    }
                    let targets = Self::resolve_targets(&f.name, &b.name, instr, refinement)?;
                    for t in targets {
                        if reachable.insert(t.clone()) {
                            worklist.push(t);
                        }
                    }
                }
            }
        }

        let mut ordered: Vec<String> = reachable.into_iter().collect();
        ordered.sort();
        Ok(ordered)
    }

    /// Build every variable and structural constraint for one level (§4.4).
    /// `functions` must already be filtered to the target level.
    pub fn build(
        store: &mut ConstraintStore,
        level: Level,
        functions: &[Function],
        entry_function: &str,
        refinement: &ControlFlowRefinement,
        cost_fn: &dyn CostFn,
    ) -> Result<IpetModelResult, CoreError> {
        let reachable = Self::compute_reachable_functions(functions, entry_function, refinement)?;
        let by_name: FxHashMap<&str, &Function> =
            functions.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut edges: Vec<(IpetEdge, VarIndex)> = Vec::new();
        let mut fn_entry_var: FxHashMap<String, VarIndex> = FxHashMap::default();
        let mut call_edges_into: FxHashMap<String, Vec<VarIndex>> = FxHashMap::default();

        // Pass 1: create every variable (function entry, block frequency,
        // CFG/maybe-exit edges, callsite and call-edge variables).
        for fname in &reachable {
            let Some(f) = by_name.get(fname.as_str()) else {
                continue;
            };
            let entry_pp = ProgramPoint::Function(f.name.clone());
            let entry_idx = store.add_variable(&entry_pp.name(), level, None)?;
            fn_entry_var.insert(f.name.clone(), entry_idx);

            for b in &f.blocks {
                let blk_pp = ProgramPoint::Block(b.name.clone());
                store.add_variable(&blk_pp.name(), level, None)?;

                for succ in &b.successors {
                    let edge = IpetEdge::new(blk_pp.clone(), EdgeEndpoint::block(succ.clone()), level);
                    let idx = store.add_variable(&edge.qualified_name(), level, None)?;
                    edges.push((edge, idx));
                }
                if b.may_return {
                    let edge = IpetEdge::new(blk_pp.clone(), EdgeEndpoint::Exit, level);
                    let idx = store.add_variable(&edge.qualified_name(), level, None)?;
                    edges.push((edge, idx));
                }

                for instr in &b.instructions {
                    if !instr.is_call() {
                        continue;
                    }
                    let insn_pp = ProgramPoint::Instruction(b.name.clone(), instr.index);
                    let insn_idx = store.add_variable(&insn_pp.name(), level, None)?;
                    store.add_constraint(
                        &[(insn_pp.name().as_str(), 1), (blk_pp.name().as_str(), -1)],
                        ConstraintOp::Equal,
                        0,
                        &format!("{}__callsite_eq_block", insn_pp.name()),
                        ConstraintTag::Structural,
                    )?;

                    if refinement.is_infeasible(&b.name) {
                        continue;
                    }
                    let targets = Self::resolve_targets(&f.name, &b.name, instr, refinement)?;
                    let mut call_var_idxs = Vec::with_capacity(targets.len());
                    for target in &targets {
                        let edge = IpetEdge::new(
                            insn_pp.clone(),
                            EdgeEndpoint::function(target.clone()),
                            level,
                        );
                        let idx = store.add_variable(&edge.qualified_name(), level, None)?;
                        call_edges_into.entry(target.clone()).or_default().push(idx);
                        call_var_idxs.push(idx);
                        edges.push((edge, idx));
                    }
                    // sum(call edges) - callsite <= 0 (§4.4 "predicated calls
                    // may be skipped").
                    let mut coeffs: FxHashMap<VarIndex, i64> =
                        call_var_idxs.into_iter().map(|idx| (idx, 1)).collect();
                    coeffs.insert(insn_idx, -1);
                    store.add_raw_constraint(
                        coeffs,
                        ConstraintOp::LessEqual,
                        0,
                        &format!("{}__calls_le_callsite", insn_pp.name()),
                        ConstraintTag::Structural,
                    )?;
                }
            }
        }

        // Pass 2: per-block flow conservation.
        for fname in &reachable {
            let Some(f) = by_name.get(fname.as_str()) else {
                continue;
            };
            let is_entry_fn = fname == entry_function;
            for b in &f.blocks {
                let blk_pp = ProgramPoint::Block(b.name.clone());
                let is_entry_block = f.entry_block().map(|e| &e.name) == Some(&b.name);

                if is_entry_block {
                    store.add_constraint(
                        &[
                            (blk_pp.name().as_str(), 1),
                            (ProgramPoint::Function(f.name.clone()).name().as_str(), -1),
                        ],
                        ConstraintOp::Equal,
                        0,
                        &format!("{}__entry_eq_fn", blk_pp.name()),
                        ConstraintTag::Structural,
                    )?;
                } else if !b.predecessors.is_empty() {
                    let mut lhs: Vec<(String, i64)> = Vec::new();
                    for p in &b.predecessors {
                        let edge = IpetEdge::new(
                            ProgramPoint::Block(p.clone()),
                            EdgeEndpoint::block(b.name.clone()),
                            level,
                        );
                        lhs.push((edge.qualified_name(), 1));
                    }
                    lhs.push((blk_pp.name(), -1));
                    let refs: Vec<(&str, i64)> =
                        lhs.iter().map(|(n, c)| (n.as_str(), *c)).collect();
                    store.add_constraint(
                        &refs,
                        ConstraintOp::Equal,
                        0,
                        &format!("{}__flow_in", blk_pp.name()),
                        ConstraintTag::Structural,
                    )?;
                }

                // Same "non-empty predecessors or entry-block" condition as
                // flow_in above, applied to flow_out: a block with no real
                // predecessors and not the function's entry is unreachable
                // dead code, and gets neither equation.
                if is_entry_block || !b.predecessors.is_empty() {
                    let mut out_lhs: Vec<(String, i64)> = b
                        .successors
                        .iter()
                        .map(|s| {
                            let edge = IpetEdge::new(
                                blk_pp.clone(),
                                EdgeEndpoint::block(s.clone()),
                                level,
                            );
                            (edge.qualified_name(), 1)
                        })
                        .collect();
                    if b.may_return {
                        let edge = IpetEdge::new(blk_pp.clone(), EdgeEndpoint::Exit, level);
                        out_lhs.push((edge.qualified_name(), 1));
                    }
                    out_lhs.push((blk_pp.name(), -1));
                    let refs: Vec<(&str, i64)> =
                        out_lhs.iter().map(|(n, c)| (n.as_str(), *c)).collect();
                    store.add_constraint(
                        &refs,
                        ConstraintOp::Equal,
                        0,
                        &format!("{}__flow_out", blk_pp.name()),
                        ConstraintTag::Structural,
                    )?;
                }

                if refinement.is_infeasible(&b.name) {
                    store.add_constraint(
                        &[(blk_pp.name().as_str(), 1)],
                        ConstraintOp::Equal,
                        0,
                        &format!("{}__infeasible", blk_pp.name()),
                        ConstraintTag::Structural,
                    )?;
                }
            }

            let fn_idx = fn_entry_var[&f.name];
            if is_entry_fn {
                store.add_raw_constraint(
                    [(fn_idx, 1)].into_iter().collect(),
                    ConstraintOp::Equal,
                    1,
                    &format!("{}__analysis_entry", f.name),
                    ConstraintTag::Structural,
                )?;
            } else {
                let incoming = call_edges_into.get(&f.name).cloned().unwrap_or_default();
                let mut coeffs: FxHashMap<VarIndex, i64> =
                    incoming.into_iter().map(|idx| (idx, 1)).collect();
                coeffs.insert(fn_idx, -1);
                store.add_raw_constraint(
                    coeffs,
                    ConstraintOp::Equal,
                    0,
                    &format!("{}__entry_eq_calls", f.name),
                    ConstraintTag::Structural,
                )?;
            }
        }

        for (edge, idx) in &edges {
            let c = cost_fn.edge_cost(edge);
            if c != 0 {
                store.add_cost(*idx, c);
            }
        }

        Ok(IpetModelResult {
            reachable_functions: reachable,
            edges,
        })
    }

    /// Incoming edges to `header` that are not back-edges, i.e. the
    /// "loop-entry frequency" sum from §4.4: `Σ edges(p -> header)` for
    /// every predecessor `p` of `header` that is *not* itself a member of
    /// the loop headed by `header`.
    pub fn loop_entry_edges(function: &Function, header: &str, level: Level) -> Vec<IpetEdge> {
        let Some(header_block) = function.block(header) else {
            return Vec::new();
        };
        header_block
            .predecessors
            .iter()
            .filter(|p| {
                function
                    .block(p)
                    .map(|pb| !pb.loops.iter().any(|h| h == header))
                    .unwrap_or(true)
            })
            .map(|p| {
                IpetEdge::new(
                    ProgramPoint::Block(p.clone()),
                    EdgeEndpoint::block(header.to_string()),
                    level,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowfacts::refinement::ControlFlowRefinement;
    use crate::ipet::cost::UniformCost;
    use crate::program::FunctionLevel;

    fn block(
        name: &str,
        preds: &[&str],
        succs: &[&str],
        loops: &[&str],
        may_return: bool,
    ) -> Block {
        Block {
            name: name.into(),
            predecessors: preds.iter().map(|s| s.to_string()).collect(),
            successors: succs.iter().map(|s| s.to_string()).collect(),
            loops: loops.iter().map(|s| s.to_string()).collect(),
            instructions: vec![],
            may_return,
            src_hint: None,
        }
    }

    fn triangle_function() -> Function {
        Function {
            name: "f".into(),
            level: FunctionLevel::Machinecode,
            linkage: "external".into(),
            blocks: vec![
                block("entry", &[], &["loop"], &[], false),
                block("loop", &["entry", "loop"], &["loop", "exit"], &["loop"], false),
                block("exit", &["loop"], &[], &[], true),
            ],
        }
    }

    #[test]
    fn triangle_cfg_builds_expected_variables_and_constraints() {
        let f = triangle_function();
        let refinement = ControlFlowRefinement::default();
        let mut store = ConstraintStore::new();
        let result = IpetModel::build(
            &mut store,
            Level::Machinecode,
            std::slice::from_ref(&f),
            "f",
            &refinement,
            &UniformCost(1),
        )
        .unwrap();

        assert_eq!(result.reachable_functions, vec!["f".to_string()]);
        // entry->loop, loop->loop, loop->exit, exit->Exit
        assert_eq!(result.edges.len(), 4);
        for (_, idx) in &result.edges {
            assert_eq!(store.cost_of(*idx), 1);
        }

        let entry_edge = store.index_of("blk:entry<arrow>blk:loop").unwrap();
        assert!(store.cost_of(entry_edge) == 1);
    }

    #[test]
    fn loop_entry_edges_excludes_the_back_edge() {
        let f = triangle_function();
        let entries = IpetModel::loop_entry_edges(&f, "loop", Level::Machinecode);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].qualified_name(), "blk:entry<arrow>blk:loop");
    }

    #[test]
    fn unresolved_indirect_call_is_fatal() {
        let mut entry = block("entry", &[], &[], &[], true);
        entry.instructions.push(Instruction {
            index: 0,
            opcode: "call".into(),
            size: 4,
            callees: Some(vec![]),
            branch_type: None,
            memmode: None,
        });
        let f = Function {
            name: "f".into(),
            level: FunctionLevel::Machinecode,
            linkage: "external".into(),
            blocks: vec![entry],
        };
        let refinement = ControlFlowRefinement::default();
        let mut store = ConstraintStore::new();
        let err = IpetModel::build(
            &mut store,
            Level::Machinecode,
            std::slice::from_ref(&f),
            "f",
            &refinement,
            &UniformCost(1),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnresolvedIndirectCall(_)));
    }

    #[test]
    fn call_fanout_reaches_both_callees() {
        let mut main_entry = block("entry", &[], &[], &[], true);
        main_entry.instructions.push(Instruction {
            index: 0,
            opcode: "call".into(),
            size: 4,
            callees: Some(vec!["a".into(), "b".into()]),
            branch_type: None,
            memmode: None,
        });
        let main = Function {
            name: "main".into(),
            level: FunctionLevel::Machinecode,
            linkage: "external".into(),
            blocks: vec![main_entry],
        };
        let a = Function {
            name: "a".into(),
            level: FunctionLevel::Machinecode,
            linkage: "external".into(),
            blocks: vec![block("entry", &[], &[], &[], true)],
        };
        let b = Function {
            name: "b".into(),
            level: FunctionLevel::Machinecode,
            linkage: "external".into(),
            blocks: vec![block("entry", &[], &[], &[], true)],
        };
        let functions = vec![main, a, b];
        let refinement = ControlFlowRefinement::default();
        let mut store = ConstraintStore::new();
        let result = IpetModel::build(
            &mut store,
            Level::Machinecode,
            &functions,
            "main",
            &refinement,
            &UniformCost(1),
        )
        .unwrap();
        assert_eq!(result.reachable_functions, vec!["a", "b", "main"]);
        assert!(store.index_of("insn:entry:0<arrow>fn:a").is_some());
        assert!(store.index_of("insn:entry:0<arrow>fn:b").is_some());
    }
}
