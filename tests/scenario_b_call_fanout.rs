//! End-to-end scenario B (spec.md §8): a callsite that may dispatch to `a`
//! (cost 5) or `b` (cost 7), bounded `callsite <= 3`, must pick 3*b = 21
//! through the call edges.

mod common;

use common::BruteForceSolver;
use wcet_ipet_core::flowfacts::engine::FlowFactEngine;
use wcet_ipet_core::flowfacts::refinement::ControlFlowRefinement;
use wcet_ipet_core::ilp::ConstraintStore;
use wcet_ipet_core::ipet::cost::CostFn;
use wcet_ipet_core::ipet::model::IpetModel;
use wcet_ipet_core::program::{
    Block, FlowFact, FlowFactOp, Function, FunctionLevel, Instruction, ProgramPointSpec, RhsExpr,
    ScopeSpec, Term,
};
use wcet_ipet_core::shared::models::{EdgeEndpoint, IpetEdge, Level, ProgramPoint};

struct CalleeCost;

impl CostFn for CalleeCost {
    fn edge_cost(&self, edge: &IpetEdge) -> i64 {
        match &edge.target {
            EdgeEndpoint::Point(ProgramPoint::Function(name)) if name == "a" => 5,
            EdgeEndpoint::Point(ProgramPoint::Function(name)) if name == "b" => 7,
            _ => 0,
        }
    }
}

fn leaf(name: &str) -> Function {
    Function {
        name: name.into(),
        level: FunctionLevel::Machinecode,
        linkage: "external".into(),
        blocks: vec![Block {
            name: "entry".into(),
            predecessors: vec![],
            successors: vec![],
            loops: vec![],
            instructions: vec![],
            may_return: true,
            src_hint: None,
        }],
    }
}

#[test]
fn call_fanout_wcet_picks_the_more_expensive_callee() {
    // The callsite sits in a loop block so its frequency can reach 3; the
    // only bound on that frequency is the user's `callsite <= 3` fact
    // below, so maximizing the call-edge cost drives it to exactly 3.
    let preheader = Block {
        name: "entry".into(),
        predecessors: vec![],
        successors: vec!["loop".into()],
        loops: vec![],
        instructions: vec![],
        may_return: false,
        src_hint: None,
    };
    let mut loop_block = Block {
        name: "loop".into(),
        predecessors: vec!["entry".into(), "loop".into()],
        successors: vec!["loop".into(), "exit".into()],
        loops: vec!["loop".into()],
        instructions: vec![],
        may_return: false,
        src_hint: None,
    };
    loop_block.instructions.push(Instruction {
        index: 0,
        opcode: "call".into(),
        size: 4,
        callees: Some(vec!["a".into(), "b".into()]),
        branch_type: None,
        memmode: None,
    });
    let exit = Block {
        name: "exit".into(),
        predecessors: vec!["loop".into()],
        successors: vec![],
        loops: vec![],
        instructions: vec![],
        may_return: true,
        src_hint: None,
    };
    let main = Function {
        name: "main".into(),
        level: FunctionLevel::Machinecode,
        linkage: "external".into(),
        blocks: vec![preheader, loop_block, exit],
    };
    let functions = vec![main, leaf("a"), leaf("b")];

    let refinement = ControlFlowRefinement::default();
    let mut store = ConstraintStore::new();
    IpetModel::build(
        &mut store,
        Level::Machinecode,
        &functions,
        "main",
        &refinement,
        &CalleeCost,
    )
    .unwrap();

    let callsite_bound = FlowFact {
        scope: ScopeSpec {
            point: ProgramPointSpec::Function { name: "main".into() },
            context: vec![],
        },
        lhs: vec![Term {
            factor: 1.0,
            program_point: ProgramPointSpec::Instruction { block: "loop".into(), index: 0 },
        }],
        op: FlowFactOp::LessEqual,
        rhs: RhsExpr::Constant(3.0),
        level: FunctionLevel::Machinecode,
        origin: "user".into(),
        attrs: Default::default(),
    };
    let mut stats = Default::default();
    FlowFactEngine::inject(
        &mut store,
        &functions,
        Level::Machinecode,
        FunctionLevel::Machinecode,
        &[callsite_bound],
        &mut stats,
    )
    .unwrap();

    let outcome = store.solve_max(&BruteForceSolver::new(3)).unwrap();
    assert_eq!(outcome.objective, 21);

    let edge_to_b = store.index_of("insn:loop:0<arrow>fn:b").unwrap();
    assert_eq!(outcome.frequencies[&edge_to_b], 3);
}
