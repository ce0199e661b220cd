//! End-to-end scenario A (spec.md §8): a triangle CFG with a loop bound of
//! 10 and unit edge cost must solve to WCET = 13
//! (entry->loop + 10*loop->loop + loop->exit + exit->Exit).

mod common;

use common::BruteForceSolver;
use wcet_ipet_core::flowfacts::engine::FlowFactEngine;
use wcet_ipet_core::flowfacts::refinement::ControlFlowRefinement;
use wcet_ipet_core::ilp::ConstraintStore;
use wcet_ipet_core::ipet::cost::UniformCost;
use wcet_ipet_core::ipet::model::IpetModel;
use wcet_ipet_core::program::{Block, FlowFact, FlowFactOp, Function, FunctionLevel, ProgramPointSpec, RhsExpr, ScopeSpec, Term};
use wcet_ipet_core::shared::models::Level;

fn block(name: &str, preds: &[&str], succs: &[&str], loops: &[&str], may_return: bool) -> Block {
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

fn triangle() -> Function {
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
fn triangle_cfg_wcet_is_thirteen() {
    let f = triangle();
    let refinement = ControlFlowRefinement::default();
    let mut store = ConstraintStore::new();
    IpetModel::build(
        &mut store,
        Level::Machinecode,
        std::slice::from_ref(&f),
        "f",
        &refinement,
        &UniformCost(1),
    )
    .unwrap();

    let loop_bound = FlowFact {
        scope: ScopeSpec {
            point: ProgramPointSpec::Loop { header: "loop".into() },
            context: vec![],
        },
        lhs: vec![Term {
            factor: 1.0,
            program_point: ProgramPointSpec::Edge {
                source: "loop".into(),
                target: "loop".into(),
            },
        }],
        op: FlowFactOp::LessEqual,
        rhs: RhsExpr::Constant(10.0),
        level: FunctionLevel::Machinecode,
        origin: "user".into(),
        attrs: Default::default(),
    };
    let mut stats = Default::default();
    FlowFactEngine::inject(
        &mut store,
        std::slice::from_ref(&f),
        Level::Machinecode,
        FunctionLevel::Machinecode,
        &[loop_bound],
        &mut stats,
    )
    .unwrap();

    let outcome = store.solve_max(&BruteForceSolver::new(11)).unwrap();
    assert_eq!(outcome.objective, 13);
}
