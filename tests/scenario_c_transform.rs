//! End-to-end scenario C (spec.md §8): bitcode block `B` corresponds,
//! through a relation graph, to two machine-code blocks `{M1, M2}`. Bounds
//! `M1 <= 4` and `M2 <= 6` on the machine side must transform *up* into a
//! single synthesized bitcode fact `B <= 10`.

use wcet_ipet_core::orchestrator::{Direction, Orchestrator};
use wcet_ipet_core::program::{
    Block, FlowFact, FlowFactOp, Function, FunctionLevel, ProgramInfo, ProgramPointSpec,
    RelationEndpoint, RelationGraph, RelationNode, RelationNodeType, RhsExpr, ScopeSpec, Term,
};
use wcet_ipet_core::AnalysisOptions;

fn leaf_block(name: &str) -> Block {
    Block {
        name: name.into(),
        predecessors: vec![],
        successors: vec![],
        loops: vec![],
        instructions: vec![],
        may_return: true,
        src_hint: None,
    }
}

fn single_block_fn(name: &str, block_name: &str, level: FunctionLevel) -> Function {
    Function {
        name: name.into(),
        level,
        linkage: "external".into(),
        blocks: vec![leaf_block(block_name)],
    }
}

fn bound(scope_fn: &str, block_name: &str, rhs: f64, level: FunctionLevel) -> FlowFact {
    FlowFact {
        scope: ScopeSpec {
            point: ProgramPointSpec::Function { name: scope_fn.into() },
            context: vec![],
        },
        lhs: vec![Term {
            factor: 1.0,
            program_point: ProgramPointSpec::Edge {
                source: block_name.into(),
                target: "Exit".into(),
            },
        }],
        op: FlowFactOp::LessEqual,
        rhs: RhsExpr::Constant(rhs),
        level,
        origin: "user".into(),
        attrs: Default::default(),
    }
}

#[test]
fn transform_up_sums_two_machine_blocks_into_one_bitcode_bound() {
    let bitcode_fn = single_block_fn("f", "B", FunctionLevel::Bitcode);
    let machine_fn = Function {
        name: "f".into(),
        level: FunctionLevel::Machinecode,
        linkage: "external".into(),
        blocks: vec![leaf_block("M1"), leaf_block("M2")],
    };

    let rg = RelationGraph {
        src: RelationEndpoint { function: "f".into(), level: FunctionLevel::Bitcode },
        dst: RelationEndpoint { function: "f".into(), level: FunctionLevel::Machinecode },
        nodes: vec![
            RelationNode {
                name: "n_m1".into(),
                node_type: RelationNodeType::Progress,
                src_block: Some("B".into()),
                dst_block: Some("M1".into()),
                src_successors: vec![],
                dst_successors: vec![],
            },
            RelationNode {
                name: "n_m2".into(),
                node_type: RelationNodeType::Progress,
                src_block: Some("B".into()),
                dst_block: Some("M2".into()),
                src_successors: vec![],
                dst_successors: vec![],
            },
        ],
    };

    let info = ProgramInfo {
        functions: vec![bitcode_fn, machine_fn],
        relation_graphs: vec![rg],
        flow_facts: vec![
            bound("f", "M1", 4.0, FunctionLevel::Machinecode),
            bound("f", "M2", 6.0, FunctionLevel::Machinecode),
        ],
        ..Default::default()
    };

    let orch = Orchestrator::new(AnalysisOptions::default());
    let (out, stats) = orch.transform(&info, Direction::Up, "transformed").unwrap();
    assert_eq!(stats.missing_relation_graphs, 0);
    assert!(out.iter().all(|ff| ff.level == FunctionLevel::Bitcode));

    let b_bounds: Vec<&FlowFact> = out
        .iter()
        .filter(|ff| {
            ff.op == FlowFactOp::LessEqual
                && ff.lhs.len() == 1
                && matches!(&ff.lhs[0].program_point, ProgramPointSpec::Block { name } if name == "B")
        })
        .collect();
    assert_eq!(b_bounds.len(), 1, "M1 and M2's bounds on B should fold into a single fact");
    assert_eq!(b_bounds[0].rhs.as_constant(), Some(10.0));
}
