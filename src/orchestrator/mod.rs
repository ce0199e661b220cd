//! [`Orchestrator`]: the three operations an external caller actually
//! invokes (§4.7), composing the IPET builder, flow-fact engine, control-
//! flow refinement, variable elimination, and the cross-level transforms
//! into `copy`, `simplify`, and `transform`.

use std::collections::{HashMap, HashSet};

use rustc_hash::FxHashMap;

use crate::config::{AnalysisOptions, AnalysisStats};
use crate::errors::CoreError;
use crate::flowfacts::engine::FlowFactEngine;
use crate::flowfacts::refinement::ControlFlowRefinement;
use crate::ilp::constraint::VarIndex;
use crate::ilp::elimination::VariableElimination;
use crate::ilp::store::ConstraintStore;
use crate::ipet::cost::{CostFn, UniformCost};
use crate::ipet::model::IpetModel;
use crate::program::{FlowFact, Function, FunctionLevel, ProgramInfo, ProgramPointSpec, RhsExpr};
use crate::shared::models::Level;
use crate::transform::{RelationGraphTransform, SymbolicBoundTransformation};

/// Which way a `transform` crosses the bitcode/machine-code boundary
/// (§4.7's "`transform(up|down)`"). The source side is the level
/// `transform` reads flow facts from; the destination side is the level
/// they're carried to through a relation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Machine code -> bitcode.
    Up,
    /// Bitcode -> machine code.
    Down,
}

fn to_level(level: FunctionLevel) -> Level {
    match level {
        FunctionLevel::Bitcode => Level::Bitcode,
        FunctionLevel::Machinecode => Level::Machinecode,
    }
}

/// Orchestrates one analysis run. Cheap to construct; holds only the
/// options every operation needs (§ design note: pass options explicitly
/// rather than through a singleton).
pub struct Orchestrator {
    pub options: AnalysisOptions,
}

impl Orchestrator {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    /// `copy` (§4.7): echo every flow fact in `info` under `origin`. No ILP
    /// is built.
    pub fn copy(&self, info: &ProgramInfo, origin: &str) -> (Vec<FlowFact>, AnalysisStats) {
        let out = info
            .flow_facts
            .iter()
            .cloned()
            .map(|mut ff| {
                ff.origin = origin.to_string();
                ff
            })
            .collect();
        (out, AnalysisStats::default())
    }

    /// `simplify` (§4.7): build the IPET at `level`, inject `info`'s flow
    /// facts, eliminate instruction variables and empty blocks (and, if
    /// `self.options.simplify_eliminate_cfg_edges`, CFG-edge variables
    /// too), then extract whatever survives.
    pub fn simplify(
        &self,
        info: &ProgramInfo,
        level: FunctionLevel,
        entry_function: &str,
        cost_fn: &dyn CostFn,
        origin: &str,
    ) -> Result<(Vec<FlowFact>, AnalysisStats), CoreError> {
        let mut stats = AnalysisStats::default();
        let functions: Vec<Function> = info.functions_at(level).cloned().collect();
        let ipet_level = to_level(level);

        let mut refinement =
            ControlFlowRefinement::derive(&info.flow_facts, entry_function, level, &mut stats);
        refinement.propagate(&functions);

        let mut store = ConstraintStore::new();
        let result = IpetModel::build(
            &mut store,
            ipet_level,
            &functions,
            entry_function,
            &refinement,
            cost_fn,
        )?;
        FlowFactEngine::inject(
            &mut store,
            &functions,
            ipet_level,
            level,
            &info.flow_facts,
            &mut stats,
        )?;

        let edge_vars: HashSet<VarIndex> = result.edges.iter().map(|(_, idx)| *idx).collect();

        let mut targets: Vec<VarIndex> = Vec::new();
        for f in &functions {
            for b in &f.blocks {
                for instr in &b.instructions {
                    if !instr.is_call() {
                        continue;
                    }
                    let name = ProgramPointSpec::Instruction {
                        block: b.name.clone(),
                        index: instr.index,
                    }
                    .to_program_point()
                    .name();
                    if let Some(idx) = store.index_of(&name) {
                        targets.push(idx);
                    }
                }
                if b.is_empty_block() {
                    let name = ProgramPointSpec::Block { name: b.name.clone() }
                        .to_program_point()
                        .name();
                    if let Some(idx) = store.index_of(&name) {
                        targets.push(idx);
                    }
                }
            }
        }
        if self.options.simplify_eliminate_cfg_edges {
            targets.extend(edge_vars.iter().copied());
        }
        targets.retain(|v| !store.has_cost(*v));

        VariableElimination::eliminate(&mut store, &targets, &self.options)?;

        let extracted =
            FlowFactEngine::extract(&store, &functions, ipet_level, level, entry_function, origin);
        Ok((extracted, stats))
    }

    /// `transform` (§4.7): partition `info`'s flow facts at `direction`'s
    /// source level by owning function (facts with no function scope form
    /// a separate "global" partition), build one IPET per partition,
    /// resolve symbolic bounds (§4.8) against a binding table drawn from
    /// the document's own `ConstantProgramPoint` facts, inject, eliminate
    /// every variable that is neither a CFG edge nor cost-bearing, extract,
    /// and finally remap each surviving fact's block names across the
    /// matching relation graph onto the destination level.
    pub fn transform(
        &self,
        info: &ProgramInfo,
        direction: Direction,
        origin: &str,
    ) -> Result<(Vec<FlowFact>, AnalysisStats), CoreError> {
        let mut stats = AnalysisStats::default();
        let (src_level, dst_level) = match direction {
            Direction::Down => (FunctionLevel::Bitcode, FunctionLevel::Machinecode),
            Direction::Up => (FunctionLevel::Machinecode, FunctionLevel::Bitcode),
        };
        let src_ipet_level = to_level(src_level);
        let src_functions: Vec<Function> = info.functions_at(src_level).cloned().collect();

        let bindings = Self::constant_bindings(&info.flow_facts);

        let (local, global): (Vec<FlowFact>, Vec<FlowFact>) = info
            .flow_facts
            .iter()
            .filter(|ff| ff.level == src_level)
            .cloned()
            .partition(Self::is_local_scope);

        let mut out = Vec::new();

        let resolved_global: Vec<FlowFact> = global
            .iter()
            .filter_map(|ff| match SymbolicBoundTransformation::try_resolve(ff, &bindings) {
                Some(r) => Some(r),
                None => {
                    stats.symbolic_bounds_skipped += 1;
                    None
                }
            })
            .collect();
        let mut global_store = ConstraintStore::new();
        FlowFactEngine::inject(
            &mut global_store,
            &[],
            src_ipet_level,
            src_level,
            &resolved_global,
            &mut stats,
        )?;
        out.extend(FlowFactEngine::extract(
            &global_store,
            &[],
            src_ipet_level,
            dst_level,
            "",
            origin,
        ));

        let mut by_function: FxHashMap<String, Vec<FlowFact>> = FxHashMap::default();
        for ff in local {
            if let Some(owner) = Self::owning_function(&ff, &src_functions) {
                by_function.entry(owner).or_default().push(ff);
            }
        }

        for (fname, facts) in by_function {
            let Some(rg) = info.relation_graph_for(&fname, src_level) else {
                stats.missing_relation_graphs += 1;
                continue;
            };

            let resolved: Vec<FlowFact> = facts
                .iter()
                .filter_map(|ff| match SymbolicBoundTransformation::try_resolve(ff, &bindings) {
                    Some(r) => Some(r),
                    None => {
                        stats.symbolic_bounds_skipped += 1;
                        None
                    }
                })
                .collect();

            let mut refinement =
                ControlFlowRefinement::derive(&resolved, &fname, src_level, &mut stats);
            refinement.propagate(&src_functions);

            let mut store = ConstraintStore::new();
            let result = IpetModel::build(
                &mut store,
                src_ipet_level,
                &src_functions,
                &fname,
                &refinement,
                &UniformCost(0),
            )?;
            FlowFactEngine::inject(
                &mut store,
                &src_functions,
                src_ipet_level,
                src_level,
                &resolved,
                &mut stats,
            )?;

            let edge_vars: HashSet<VarIndex> = result.edges.iter().map(|(_, idx)| *idx).collect();
            let targets: Vec<VarIndex> = (1..=store.num_variables())
                .filter(|v| !edge_vars.contains(v) && !store.has_cost(*v))
                .collect();
            VariableElimination::eliminate(&mut store, &targets, &self.options)?;

            let extracted = FlowFactEngine::extract(
                &store,
                &src_functions,
                src_ipet_level,
                src_level,
                &fname,
                origin,
            );
            let mut remapped = Vec::new();
            for ff in extracted {
                match RelationGraphTransform::remap(&ff, rg, src_level) {
                    Some(mapped) => remapped.push(mapped),
                    None => stats.symbolic_bounds_skipped += 1,
                }
            }
            out.extend(Self::merge_coincident_bounds(remapped));
        }

        Ok((out, stats))
    }

    /// Two source blocks that remap onto the same destination program point
    /// (the relation graph's "one bitcode block, several machine-code
    /// copies" shape, §8 scenario C) surface here as two bounds on an
    /// identical scope/LHS after remapping. Every execution of the
    /// destination point corresponds to exactly one of its source copies,
    /// never both, so their `<=` bounds add: `B <= 4` and `B <= 6` folding
    /// to `B <= 10`, not `B <= min(4, 6)`. Facts with distinct LHS/scope
    /// pass through unmerged; non-`<=` facts are never merged.
    fn merge_coincident_bounds(facts: Vec<FlowFact>) -> Vec<FlowFact> {
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, FlowFact> = HashMap::new();
        for ff in facts {
            // `extract` labels every fact's scope with a per-constraint
            // `extracted_N` marker (never meaningful across constraints), so
            // the merge key is the LHS alone: two facts bind the same
            // underlying quantity once their (now-remapped) LHS match.
            let key = if ff.op == crate::program::FlowFactOp::LessEqual {
                serde_json::to_string(&ff.lhs).unwrap_or_else(|_| format!("__unmergeable_{}", order.len()))
            } else {
                format!("__unmergeable_{}", order.len())
            };
            match merged.get_mut(&key) {
                Some(existing) => {
                    if let (RhsExpr::Constant(a), RhsExpr::Constant(b)) = (&existing.rhs, &ff.rhs) {
                        existing.rhs = RhsExpr::Constant(a + b);
                    }
                }
                None => {
                    order.push(key.clone());
                    merged.insert(key, ff);
                }
            }
        }
        order.into_iter().filter_map(|k| merged.remove(&k)).collect()
    }

    /// Every `ConstantProgramPoint` a document names, anywhere in a flow
    /// fact's scope or LHS, as a name -> value binding table for
    /// [`SymbolicBoundTransformation`] (§4.8).
    fn constant_bindings(flow_facts: &[FlowFact]) -> HashMap<String, f64> {
        let mut bindings = HashMap::new();
        for ff in flow_facts {
            Self::collect_constant(&ff.scope.point, &mut bindings);
            for term in &ff.lhs {
                Self::collect_constant(&term.program_point, &mut bindings);
            }
        }
        bindings
    }

    fn collect_constant(point: &ProgramPointSpec, bindings: &mut HashMap<String, f64>) {
        if let ProgramPointSpec::ConstantProgramPoint { name, value } = point {
            bindings.insert(name.clone(), *value as f64);
        }
    }

    /// A fact is locally scoped if its scope names something that lives
    /// inside one function (§4.7 "partition flow facts by local function
    /// scope"); everything else (markers, global scalars, frequency
    /// variables) is global.
    fn is_local_scope(ff: &FlowFact) -> bool {
        matches!(
            ff.scope.point,
            ProgramPointSpec::Function { .. }
                | ProgramPointSpec::Block { .. }
                | ProgramPointSpec::Edge { .. }
                | ProgramPointSpec::Instruction { .. }
                | ProgramPointSpec::Loop { .. }
        )
    }

    fn owning_function(ff: &FlowFact, functions: &[Function]) -> Option<String> {
        let block_name = match &ff.scope.point {
            ProgramPointSpec::Function { name } => return Some(name.clone()),
            ProgramPointSpec::Block { name } => name,
            ProgramPointSpec::Edge { source, .. } => source,
            ProgramPointSpec::Instruction { block, .. } => block,
            ProgramPointSpec::Loop { header } => header,
            _ => return None,
        };
        functions
            .iter()
            .find(|f| f.block(block_name).is_some())
            .map(|f| f.name.clone())
    }
}
