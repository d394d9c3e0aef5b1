//! Basic blocks.

use crate::{
    ir::{Instruction, ValueId},
    program::TypeId,
};

/// SSA merge of values flowing in from the predecessors of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phi {
    /// Defined value.
    pub dest: ValueId,
    /// One operand per predecessor, in predecessor order.
    pub operands: Vec<ValueId>,
}

/// An exceptional edge to a handler block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchHandler {
    /// Caught exception type, `None` for catch-all.
    pub guard: Option<TypeId>,
    /// Handler block.
    pub target: usize,
}

/// A straight-line sequence of instructions ending in a terminator.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub(crate) id: usize,
    pub(crate) phis: Vec<Phi>,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) successors: Vec<usize>,
    pub(crate) handlers: Vec<CatchHandler>,
}

impl BasicBlock {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Index of the block in its method.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Phis at the start of the block.
    #[must_use]
    pub fn phis(&self) -> &[Phi] {
        &self.phis
    }

    /// Instructions in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Normal successors, in the order the terminator selects them.
    #[must_use]
    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    /// Exception handlers guarding the block.
    #[must_use]
    pub fn handlers(&self) -> &[CatchHandler] {
        &self.handlers
    }

    /// Normal successors followed by handler blocks.
    pub fn all_successors(&self) -> impl Iterator<Item = usize> + '_ {
        self.successors
            .iter()
            .copied()
            .chain(self.handlers.iter().map(|handler| handler.target))
    }

    /// Returns `true` if `block` is reached through an exceptional edge.
    #[must_use]
    pub fn has_catch_successor(&self, block: usize) -> bool {
        self.handlers.iter().any(|handler| handler.target == block)
    }

    /// The last instruction whose exception transfers control to the handlers.
    ///
    /// Returns its index, or `None` for unguarded blocks and blocks that
    /// cannot throw. Earlier throwing instructions may transfer control too,
    /// see [`BasicBlock::throwing_instruction_count`].
    #[must_use]
    pub fn exceptional_exit(&self) -> Option<usize> {
        if self.handlers.is_empty() {
            return None;
        }
        self.instructions
            .iter()
            .rposition(|instruction| instruction.op.can_throw())
    }

    /// Number of instructions in the block that may throw.
    #[must_use]
    pub fn throwing_instruction_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|instruction| instruction.op.can_throw())
            .count()
    }

    /// The terminator, if the block is complete.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions
            .last()
            .filter(|instruction| instruction.op.is_terminator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Op;

    #[test]
    fn test_exceptional_exit() {
        let mut block = BasicBlock::new(0);
        block.instructions = vec![
            Instruction::new(Op::NewInstance {
                dest: ValueId::new(0),
                class: TypeId::new(0),
            }),
            Instruction::new(Op::ConstNull {
                dest: ValueId::new(1),
            }),
            Instruction::new(Op::Goto),
        ];
        block.successors = vec![1];
        assert_eq!(block.exceptional_exit(), None);

        block.handlers.push(CatchHandler {
            guard: None,
            target: 2,
        });
        assert_eq!(block.exceptional_exit(), Some(0));
        assert_eq!(block.throwing_instruction_count(), 1);
        assert!(block.has_catch_successor(2));
        assert!(!block.has_catch_successor(1));
        assert_eq!(block.all_successors().collect::<Vec<_>>(), vec![1, 2]);
        assert!(block.terminator().is_some());
    }
}
