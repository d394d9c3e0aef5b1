//! Method bodies.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::{
    ir::{BasicBlock, Instruction, InvokeKind, Op, Value, ValueId},
    program::{MethodId, MethodRef},
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Error, Result,
};

/// The control-flow graph of one method in SSA form.
///
/// Block 0 is the entry. Predecessor lists are derived from the successor
/// and handler edges, deduplicated and sorted by block index; phi operands
/// follow that order.
#[derive(Debug, Clone)]
pub struct MethodCode {
    pub(crate) method: MethodId,
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) values: Vec<Value>,
    pub(crate) predecessors: Vec<Vec<usize>>,
}

impl MethodCode {
    pub(crate) fn new(method: MethodId) -> Self {
        Self {
            method,
            blocks: Vec::new(),
            values: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    /// The method this body belongs to.
    #[must_use]
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// All blocks, indexed by block id.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Returns a block by id.
    #[must_use]
    pub fn block(&self, id: usize) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }

    /// Returns the metadata of a value.
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.index())
    }

    /// Number of values ever created in this body.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Predecessors of `block`.
    #[must_use]
    pub fn predecessors_of(&self, block: usize) -> &[usize] {
        self.predecessors.get(block).map_or(&[], Vec::as_slice)
    }

    /// Iterates over every instruction of every block.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|block| block.instructions.iter())
    }

    /// Number of instructions across all blocks.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.instructions.len()).sum()
    }

    /// Iterates over the invocations with a method reference.
    pub fn invokes(&self) -> impl Iterator<Item = (InvokeKind, &MethodRef)> {
        self.instructions().filter_map(|instruction| match &instruction.op {
            Op::Invoke { kind, method, .. } => Some((*kind, method)),
            _ => None,
        })
    }

    /// Returns `true` if the body contains an instance or static field read,
    /// or a class-initialization check.
    #[must_use]
    pub fn has_field_get_or_init_class(&self) -> bool {
        self.instructions().any(|instruction| {
            matches!(
                instruction.op,
                Op::InstanceGet { .. } | Op::StaticGet { .. } | Op::InitClass { .. }
            )
        })
    }

    /// Follows alias links to the value `value` is a refined copy of.
    #[must_use]
    pub fn aliased_value(&self, value: ValueId) -> ValueId {
        let mut current = value;
        let mut steps = 0;
        while let Some(next) = self.value(current).and_then(|v| v.alias_of) {
            current = next;
            steps += 1;
            if steps > self.values.len() {
                break;
            }
        }
        current
    }

    /// Values whose definitions read `value`.
    #[must_use]
    pub fn affected_values(&self, value: ValueId) -> Vec<ValueId> {
        let mut affected = Vec::new();
        for block in &self.blocks {
            for phi in &block.phis {
                if phi.operands.contains(&value) {
                    affected.push(phi.dest);
                }
            }
            for instruction in &block.instructions {
                if instruction.op.operands().contains(&value) {
                    affected.extend(instruction.op.dest());
                }
            }
        }
        affected
    }

    /// Rewrites every use of `old` into a use of `new`. Returns the number of
    /// rewritten uses.
    pub fn replace_uses(&mut self, old: ValueId, new: ValueId) -> usize {
        let mut replaced = 0;
        for block in &mut self.blocks {
            for phi in &mut block.phis {
                for operand in &mut phi.operands {
                    if *operand == old {
                        *operand = new;
                        replaced += 1;
                    }
                }
            }
            for instruction in &mut block.instructions {
                for operand in instruction.op.operands_mut() {
                    if *operand == old {
                        *operand = new;
                        replaced += 1;
                    }
                }
                for operand in &mut instruction.debug_values {
                    if *operand == old {
                        *operand = new;
                        replaced += 1;
                    }
                }
            }
        }
        replaced
    }

    /// Removes phis whose operands, ignoring the phi itself, are all the same
    /// value. Returns the number of removed phis.
    pub fn remove_trivial_phis(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let mut trivial = None;
            'search: for (block_index, block) in self.blocks.iter().enumerate() {
                for (phi_index, phi) in block.phis.iter().enumerate() {
                    let mut same: Option<ValueId> = None;
                    let mut is_trivial = true;
                    for &operand in &phi.operands {
                        if operand == phi.dest || Some(operand) == same {
                            continue;
                        }
                        if same.is_some() {
                            is_trivial = false;
                            break;
                        }
                        same = Some(operand);
                    }
                    if let (true, Some(value)) = (is_trivial, same) {
                        trivial = Some((block_index, phi_index, phi.dest, value));
                        break 'search;
                    }
                }
            }

            let Some((block_index, phi_index, dest, value)) = trivial else {
                return removed;
            };
            self.blocks[block_index].phis.remove(phi_index);
            self.replace_uses(dest, value);
            removed += 1;
        }
    }

    /// Replaces the operation at `index` of `block`.
    pub(crate) fn replace_op(&mut self, block: usize, index: usize, op: Op) {
        if let Some(instruction) = self
            .blocks
            .get_mut(block)
            .and_then(|b| b.instructions.get_mut(index))
        {
            instruction.op = op;
        }
    }

    /// Removes the instruction at `index` of `block`, or turns it into a
    /// [`Op::DebugLocalRead`] if it keeps debug values alive.
    ///
    /// Returns `true` if the instruction was removed.
    pub(crate) fn remove_or_replace_by_debug_local_read(&mut self, block: usize, index: usize) -> bool {
        let Some(instructions) = self.blocks.get_mut(block).map(|b| &mut b.instructions) else {
            return false;
        };
        let keeps_debug_values = match instructions.get(index) {
            Some(instruction) => !instruction.debug_values.is_empty(),
            None => return false,
        };
        if keeps_debug_values {
            instructions[index].op = Op::DebugLocalRead;
            false
        } else {
            instructions.remove(index);
            true
        }
    }

    /// Recomputes predecessor lists from the block edges.
    pub(crate) fn rebuild_predecessors(&mut self) {
        let mut predecessors = vec![Vec::new(); self.blocks.len()];
        for block in &self.blocks {
            for successor in block.all_successors() {
                if let Some(list) = predecessors.get_mut(successor) {
                    if !list.contains(&block.id) {
                        list.push(block.id);
                    }
                }
            }
        }
        for list in &mut predecessors {
            list.sort_unstable();
        }
        self.predecessors = predecessors;
    }

    fn inconsistent(&self, message: String) -> Error {
        Error::InconsistentCode {
            method: self.method,
            message,
        }
    }

    /// Verifies the structural invariants of the body.
    ///
    /// Every value is defined exactly once and every use refers to a defined
    /// value, blocks end in exactly one terminator with a matching number of
    /// successors, edges stay in bounds and phis have one operand per
    /// predecessor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentCode`] describing the first violation.
    pub fn check_consistency(&self) -> Result<()> {
        if self.blocks.is_empty() {
            return Err(self.inconsistent("method has no blocks".to_string()));
        }

        let mut defined = vec![false; self.values.len()];
        let mut define = |value: ValueId| -> Result<()> {
            match defined.get_mut(value.index()) {
                None => Err(self.inconsistent(format!("{value} was never allocated"))),
                Some(true) => Err(self.inconsistent(format!("{value} is defined twice"))),
                Some(slot) => {
                    *slot = true;
                    Ok(())
                }
            }
        };
        for block in &self.blocks {
            for phi in &block.phis {
                define(phi.dest)?;
            }
            for instruction in &block.instructions {
                if let Some(dest) = instruction.op.dest() {
                    define(dest)?;
                }
            }
        }

        for (index, block) in self.blocks.iter().enumerate() {
            if block.id != index {
                return Err(self.inconsistent(format!("block {index} carries id {}", block.id)));
            }
            let Some(last) = block.instructions.last() else {
                return Err(self.inconsistent(format!("block {index} is empty")));
            };
            let Some(expected) = last.op.successor_count() else {
                return Err(self.inconsistent(format!(
                    "block {index} ends in non-terminator {}",
                    last.op.name()
                )));
            };
            if expected != block.successors.len() {
                return Err(self.inconsistent(format!(
                    "block {index} has {} successors, {} needs {expected}",
                    block.successors.len(),
                    last.op.name()
                )));
            }
            let body = &block.instructions[..block.instructions.len() - 1];
            if let Some(misplaced) = body.iter().find(|i| i.op.is_terminator()) {
                return Err(self.inconsistent(format!(
                    "block {index} contains {} before its end",
                    misplaced.op.name()
                )));
            }
            if let Some(target) = block.all_successors().find(|&t| t >= self.blocks.len()) {
                return Err(self.inconsistent(format!(
                    "block {index} jumps to missing block {target}"
                )));
            }
            let predecessor_count = self.predecessors_of(index).len();
            for phi in &block.phis {
                if phi.operands.len() != predecessor_count {
                    return Err(self.inconsistent(format!(
                        "phi {} in block {index} has {} operands for {predecessor_count} predecessors",
                        phi.dest,
                        phi.operands.len()
                    )));
                }
            }

            let uses = block
                .phis
                .iter()
                .flat_map(|phi| phi.operands.iter().copied())
                .chain(block.instructions.iter().flat_map(Instruction::uses));
            for used in uses {
                if !defined.get(used.index()).copied().unwrap_or(false) {
                    return Err(self.inconsistent(format!(
                        "block {index} uses undefined value {used}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// All values defined in the body.
    #[must_use]
    pub fn defined_values(&self) -> FxHashSet<ValueId> {
        let mut values = FxHashSet::default();
        for block in &self.blocks {
            values.extend(block.phis.iter().map(|phi| phi.dest));
            values.extend(block.instructions.iter().filter_map(|i| i.op.dest()));
        }
        values
    }
}

impl GraphBase for MethodCode {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for MethodCode {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.blocks
            .get(node.index())
            .into_iter()
            .flat_map(|block| block.all_successors().map(NodeId::new))
    }
}

impl Predecessors for MethodCode {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.predecessors_of(node.index())
            .iter()
            .copied()
            .map(NodeId::new)
    }
}

impl RootedGraph for MethodCode {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}

impl fmt::Display for MethodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method {}:", self.method)?;
        for block in &self.blocks {
            write!(f, "  B{}", block.id)?;
            if !self.predecessors_of(block.id).is_empty() {
                write!(f, " <- {:?}", self.predecessors_of(block.id))?;
            }
            writeln!(f, ":")?;
            for phi in &block.phis {
                writeln!(f, "    {} = phi {:?}", phi.dest, phi.operands)?;
            }
            for instruction in &block.instructions {
                writeln!(f, "    {}", instruction.op)?;
            }
            if !block.successors.is_empty() {
                writeln!(f, "    -> {:?}", block.successors)?;
            }
            for handler in &block.handlers {
                writeln!(f, "    catch -> B{}", handler.target)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ir::{CodeBuilder, CompareKind, Op, ValueId},
        program::{FieldRef, MethodId, TypeId},
        Error,
    };

    fn field() -> FieldRef {
        FieldRef::new(TypeId::new(0), "f", "I")
    }

    #[test]
    fn test_replace_uses_and_affected_values() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        let this = builder.argument(0);
        let first = builder.instance_get(this, field());
        let second = builder.instance_get(this, field());
        let sum = builder.add(first, second);
        builder.return_value(sum);
        let mut code = builder.finish().unwrap();

        assert_eq!(code.affected_values(second), vec![sum]);
        assert_eq!(code.replace_uses(second, first), 1);
        assert!(code.affected_values(second).is_empty());
        code.check_consistency().unwrap();
    }

    #[test]
    fn test_remove_trivial_phis() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        let value = builder.const_number(1);
        let cond = builder.argument(0);
        let left = builder.new_block();
        let right = builder.new_block();
        let join = builder.new_block();
        builder.if_(CompareKind::Eq, cond, None, left, right);
        builder.switch_to(left);
        builder.goto(join);
        builder.switch_to(right);
        builder.goto(join);
        builder.switch_to(join);
        let phi = builder.phi(&[value, value]);
        builder.return_value(phi);
        let mut code = builder.finish().unwrap();

        assert_eq!(code.remove_trivial_phis(), 1);
        assert!(code.block(join).unwrap().phis().is_empty());
        assert!(matches!(
            code.block(join).unwrap().instructions()[0].op,
            Op::Return { value: Some(v) } if v == value
        ));
        code.check_consistency().unwrap();
    }

    #[test]
    fn test_consistency_detects_dangling_use() {
        let mut builder = CodeBuilder::new(MethodId::new(3));
        let this = builder.argument(0);
        let read = builder.instance_get(this, field());
        builder.return_value(read);
        let mut code = builder.finish().unwrap();

        // Drop the read but keep its use.
        assert!(code.remove_or_replace_by_debug_local_read(0, 1));
        let error = code.check_consistency().unwrap_err();
        assert!(matches!(error, Error::InconsistentCode { method, .. } if method == MethodId::new(3)));
    }

    #[test]
    fn test_debug_values_keep_instruction() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        let this = builder.argument(0);
        builder.instance_get(this, field());
        builder.attach_debug_values(&[this]);
        builder.return_void();
        let mut code = builder.finish().unwrap();

        assert!(!code.remove_or_replace_by_debug_local_read(0, 1));
        assert!(matches!(
            code.block(0).unwrap().instructions()[1].op,
            Op::DebugLocalRead
        ));
        code.check_consistency().unwrap();
    }

    #[test]
    fn test_aliased_value() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        let this = builder.argument(0);
        let assumed = builder.assume(this);
        let again = builder.assume(assumed);
        builder.return_void();
        let code = builder.finish().unwrap();

        assert_eq!(code.aliased_value(again), this);
        assert_eq!(code.aliased_value(this), this);
        assert_eq!(code.aliased_value(ValueId::new(99)), ValueId::new(99));
    }

    #[test]
    fn test_has_field_get_or_init_class() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        builder.return_void();
        assert!(!builder.finish().unwrap().has_field_get_or_init_class());

        let mut builder = CodeBuilder::new(MethodId::new(0));
        builder.init_class(TypeId::new(1));
        builder.return_void();
        assert!(builder.finish().unwrap().has_field_get_or_init_class());
    }
}
