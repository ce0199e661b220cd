//! Cross-level name remapping through a bitcode<->machine-code relation
//! graph (§4.7): "maps blocks and argument names via the relation graph".
//!
//! A flow fact extracted at one level names blocks (directly, or as an
//! edge's endpoints) that only make sense at that level. Carrying it to the
//! other level means rewriting every block-kind program point it mentions
//! through the matching [`RelationNode`](crate::program::RelationNode)'s
//! `src_block`/`dst_block` pair. Facts that name a block with no
//! counterpart on the target side (pure compiler scaffolding, or
//! source-level constructs the backend optimized away) cannot be carried
//! across and are reported back to the caller as untranslatable, the same
//! bucket symbolic bounds fall into.
//!
//! Grounded on `flowfacts/engine.rs`'s `var_name_to_spec`/term-translation
//! shape, generalized from "ILP variable name <-> abstract term" to
//! "block name on one level <-> block name on the other".

use crate::program::{FlowFact, FunctionLevel, ProgramPointSpec, RelationGraph};

pub struct RelationGraphTransform;

impl RelationGraphTransform {
    /// Remap every block-kind program point `ff` mentions (its scope and
    /// every LHS term) from the side of `rg` matching `from_level` to the
    /// other side. Returns `None` if any such point names a block the
    /// relation graph never maps on the source side, or whose mapped
    /// counterpart is absent on the target side.
    pub fn remap(ff: &FlowFact, rg: &RelationGraph, from_level: FunctionLevel) -> Option<FlowFact> {
        let reverse = rg.dst.level == from_level;
        let mut out = ff.clone();
        if !Self::remap_point(&mut out.scope.point, rg, reverse) {
            return None;
        }
        for term in &mut out.lhs {
            if !Self::remap_point(&mut term.program_point, rg, reverse) {
                return None;
            }
        }
        out.level = if reverse { rg.src.level } else { rg.dst.level };
        Some(out)
    }

    fn remap_point(point: &mut ProgramPointSpec, rg: &RelationGraph, reverse: bool) -> bool {
        match point {
            ProgramPointSpec::Block { name } => match Self::remap_block(name, rg, reverse) {
                Some(mapped) => {
                    *name = mapped;
                    true
                }
                None => false,
            },
            ProgramPointSpec::Edge { source, target } => {
                let Some(mapped_source) = Self::remap_block(source, rg, reverse) else {
                    return false;
                };
                *source = mapped_source;
                if target != "Exit" {
                    let Some(mapped_target) = Self::remap_block(target, rg, reverse) else {
                        return false;
                    };
                    *target = mapped_target;
                }
                true
            }
            ProgramPointSpec::Instruction { block, .. } => {
                // Instructions live inside a block; only the owning block's
                // name needs remapping for the fact to parse at the target
                // level (the instruction index is level-local and has no
                // counterpart the relation graph could name).
                match Self::remap_block(block, rg, reverse) {
                    Some(mapped) => {
                        *block = mapped;
                        true
                    }
                    None => false,
                }
            }
            ProgramPointSpec::Loop { header } => match Self::remap_block(header, rg, reverse) {
                Some(mapped) => {
                    *header = mapped;
                    true
                }
                None => false,
            },
            // Function/Marker/Constant/FrequencyVariable/GlobalProgramPoint
            // name a level-independent scalar or the function itself (whose
            // name this crate assumes is shared across levels); nothing to
            // remap.
            _ => true,
        }
    }

    fn remap_block(name: &str, rg: &RelationGraph, reverse: bool) -> Option<String> {
        if reverse {
            rg.node_for_dst_block(name).and_then(|n| n.src_block.clone())
        } else {
            rg.node_for_src_block(name).and_then(|n| n.dst_block.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{
        FlowFactOp, RelationEndpoint, RelationNode, RelationNodeType, RhsExpr, ScopeSpec, Term,
    };

    fn sample_rg() -> RelationGraph {
        RelationGraph {
            src: RelationEndpoint {
                function: "main".into(),
                level: FunctionLevel::Bitcode,
            },
            dst: RelationEndpoint {
                function: "main".into(),
                level: FunctionLevel::Machinecode,
            },
            nodes: vec![RelationNode {
                name: "n0".into(),
                node_type: RelationNodeType::Progress,
                src_block: Some("entry".into()),
                dst_block: Some("entry_mc".into()),
                src_successors: vec![],
                dst_successors: vec![],
            }],
        }
    }

    fn block_fact(name: &str, level: FunctionLevel) -> FlowFact {
        FlowFact {
            scope: ScopeSpec {
                point: ProgramPointSpec::Block { name: name.into() },
                context: vec![],
            },
            lhs: vec![Term {
                factor: 1.0,
                program_point: ProgramPointSpec::Block { name: name.into() },
            }],
            op: FlowFactOp::LessEqual,
            rhs: RhsExpr::Constant(5.0),
            level,
            origin: "user".into(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn remap_down_translates_src_block_to_dst_block() {
        let rg = sample_rg();
        let ff = block_fact("entry", FunctionLevel::Bitcode);
        let mapped = RelationGraphTransform::remap(&ff, &rg, FunctionLevel::Bitcode).unwrap();
        assert_eq!(mapped.level, FunctionLevel::Machinecode);
        match &mapped.scope.point {
            ProgramPointSpec::Block { name } => assert_eq!(name, "entry_mc"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn remap_up_translates_dst_block_to_src_block() {
        let rg = sample_rg();
        let ff = block_fact("entry_mc", FunctionLevel::Machinecode);
        let mapped = RelationGraphTransform::remap(&ff, &rg, FunctionLevel::Machinecode).unwrap();
        assert_eq!(mapped.level, FunctionLevel::Bitcode);
        match &mapped.scope.point {
            ProgramPointSpec::Block { name } => assert_eq!(name, "entry"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unmapped_block_name_is_untranslatable() {
        let rg = sample_rg();
        let ff = block_fact("ghost", FunctionLevel::Bitcode);
        assert!(RelationGraphTransform::remap(&ff, &rg, FunctionLevel::Bitcode).is_none());
    }

    #[test]
    fn edge_endpoints_remap_independently_and_exit_passes_through() {
        let rg = sample_rg();
        let ff = FlowFact {
            scope: ScopeSpec {
                point: ProgramPointSpec::Function { name: "main".into() },
                context: vec![],
            },
            lhs: vec![Term {
                factor: 1.0,
                program_point: ProgramPointSpec::Edge {
                    source: "entry".into(),
                    target: "Exit".into(),
                },
            }],
            op: FlowFactOp::LessEqual,
            rhs: RhsExpr::Constant(1.0),
            level: FunctionLevel::Bitcode,
            origin: "user".into(),
            attrs: Default::default(),
        };
        let mapped = RelationGraphTransform::remap(&ff, &rg, FunctionLevel::Bitcode).unwrap();
        match &mapped.lhs[0].program_point {
            ProgramPointSpec::Edge { source, target } => {
                assert_eq!(source, "entry_mc");
                assert_eq!(target, "Exit");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
