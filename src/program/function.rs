//! The `function`/`block`/`instruction` entities of the external program
//! document (§6).

use serde::{Deserialize, Serialize};

/// Program representation level a [`Function`] is expressed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionLevel {
    Bitcode,
    Machinecode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub level: FunctionLevel,
    pub blocks: Vec<Block>,
    pub linkage: String,
}

impl Function {
    pub fn entry_block(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    #[serde(default)]
    pub predecessors: Vec<String>,
    #[serde(default)]
    pub successors: Vec<String>,
    /// Loop headers this block belongs to, outermost first.
    #[serde(default)]
    pub loops: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default = "default_true")]
    pub may_return: bool,
    #[serde(default)]
    pub src_hint: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Block {
    /// True if this block has no instructions and, per §4.7's `simplify`
    /// definition, is a candidate for elimination as an empty block.
    pub fn is_empty_block(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub index: usize,
    pub opcode: String,
    pub size: u32,
    #[serde(default)]
    pub callees: Option<Vec<String>>,
    #[serde(default)]
    pub branch_type: Option<String>,
    #[serde(default)]
    pub memmode: Option<String>,
}

impl Instruction {
    /// True for a call-family instruction: it carries a (possibly empty,
    /// meaning indirect-unresolved) callee list.
    pub fn is_call(&self) -> bool {
        self.callees.is_some()
    }

    /// True if this is an indirect call with no statically known and no
    /// refined target set yet (§7 `UnresolvedIndirectCall`).
    pub fn is_unresolved_indirect_call(&self) -> bool {
        matches!(&self.callees, Some(callees) if callees.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_function() -> Function {
        Function {
            name: "main".into(),
            level: FunctionLevel::Machinecode,
            linkage: "external".into(),
            blocks: vec![
                Block {
                    name: "entry".into(),
                    predecessors: vec![],
                    successors: vec!["body".into()],
                    loops: vec![],
                    instructions: vec![Instruction {
                        index: 0,
                        opcode: "br".into(),
                        size: 2,
                        callees: None,
                        branch_type: Some("unconditional".into()),
                        memmode: None,
                    }],
                    may_return: true,
                    src_hint: None,
                },
                Block {
                    name: "body".into(),
                    predecessors: vec!["entry".into()],
                    successors: vec![],
                    loops: vec![],
                    instructions: vec![],
                    may_return: true,
                    src_hint: None,
                },
            ],
        }
    }

    #[test]
    fn entry_block_is_first_block() {
        let f = sample_function();
        assert_eq!(f.entry_block().unwrap().name, "entry");
    }

    #[test]
    fn empty_block_detection() {
        let f = sample_function();
        assert!(!f.block("entry").unwrap().is_empty_block());
        assert!(f.block("body").unwrap().is_empty_block());
    }

    #[test]
    fn unresolved_indirect_call_has_empty_callee_list() {
        let insn = Instruction {
            index: 1,
            opcode: "call".into(),
            size: 4,
            callees: Some(vec![]),
            branch_type: None,
            memmode: None,
        };
        assert!(insn.is_call());
        assert!(insn.is_unresolved_indirect_call());
    }
}
