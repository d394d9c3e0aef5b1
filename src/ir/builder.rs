//! Programmatic construction of method bodies.

use std::sync::Arc;

use crate::{
    ir::{
        BasicBlock, BinopKind, CatchHandler, CompareKind, Instruction, InvokeKind, MethodCode, Op,
        Phi, Value, ValueId,
    },
    program::{FieldRef, MethodId, MethodRef, TypeId},
    Result,
};

/// Builds a [`MethodCode`] block by block.
///
/// Instructions are appended to the current block. Terminators record the
/// successor edges of the current block, so they should be emitted last.
///
/// # Example
///
/// ```rust
/// use shrinkwave::ir::CodeBuilder;
/// use shrinkwave::program::{FieldRef, MethodId, TypeId};
///
/// let field = FieldRef::new(TypeId::new(0), "count", "I");
/// let mut builder = CodeBuilder::new(MethodId::new(0));
/// let this = builder.argument(0);
/// let count = builder.instance_get(this, field);
/// builder.return_value(count);
/// let code = builder.finish()?;
///
/// assert_eq!(code.instruction_count(), 3);
/// # Ok::<(), shrinkwave::Error>(())
/// ```
#[derive(Debug)]
pub struct CodeBuilder {
    code: MethodCode,
    current: usize,
}

impl CodeBuilder {
    /// Starts a body for `method` with an empty entry block.
    #[must_use]
    pub fn new(method: MethodId) -> Self {
        let mut code = MethodCode::new(method);
        code.blocks.push(BasicBlock::new(0));
        Self { code, current: 0 }
    }

    /// Appends a new empty block and returns its id.
    pub fn new_block(&mut self) -> usize {
        let id = self.code.blocks.len();
        self.code.blocks.push(BasicBlock::new(id));
        id
    }

    /// Makes `block` the target of subsequent instructions.
    pub fn switch_to(&mut self, block: usize) {
        self.current = block;
    }

    /// The block instructions are currently appended to.
    #[must_use]
    pub fn current_block(&self) -> usize {
        self.current
    }

    /// Allocates a fresh value.
    pub fn new_value(&mut self) -> ValueId {
        let id = ValueId::new(u32::try_from(self.code.values.len()).unwrap_or(u32::MAX));
        self.code.values.push(Value::default());
        id
    }

    /// Binds `value` to a source-level local.
    pub fn set_local(&mut self, value: ValueId, name: &str) {
        if let Some(meta) = self.code.values.get_mut(value.index()) {
            meta.local = Some(Arc::from(name));
        }
    }

    fn block_mut(&mut self) -> &mut BasicBlock {
        let current = self.current;
        &mut self.code.blocks[current]
    }

    /// Appends an instruction to the current block.
    pub fn emit(&mut self, op: Op) {
        self.block_mut().instructions.push(Instruction::new(op));
    }

    fn emit_value(&mut self, op: impl FnOnce(ValueId) -> Op) -> ValueId {
        let dest = self.new_value();
        self.emit(op(dest));
        dest
    }

    /// Attaches debug values to the last instruction of the current block.
    pub fn attach_debug_values(&mut self, values: &[ValueId]) {
        if let Some(last) = self.block_mut().instructions.last_mut() {
            last.debug_values.extend_from_slice(values);
        }
    }

    /// Adds an exception handler to the current block.
    pub fn add_handler(&mut self, guard: Option<TypeId>, target: usize) {
        self.block_mut()
            .handlers
            .push(CatchHandler { guard, target });
    }

    /// Adds a phi to the current block. Operands follow the predecessor
    /// order, which is ascending block id.
    pub fn phi(&mut self, operands: &[ValueId]) -> ValueId {
        let dest = self.new_value();
        self.block_mut().phis.push(Phi {
            dest,
            operands: operands.to_vec(),
        });
        dest
    }

    // Values

    /// Method argument `index`.
    pub fn argument(&mut self, index: u16) -> ValueId {
        self.emit_value(|dest| Op::Argument { dest, index })
    }

    /// Numeric constant.
    pub fn const_number(&mut self, value: i64) -> ValueId {
        self.emit_value(|dest| Op::ConstNumber { dest, value })
    }

    /// Null constant.
    pub fn const_null(&mut self) -> ValueId {
        self.emit_value(|dest| Op::ConstNull { dest })
    }

    /// String constant.
    pub fn const_string(&mut self, value: &str) -> ValueId {
        let value: Arc<str> = Arc::from(value);
        self.emit_value(|dest| Op::ConstString { dest, value })
    }

    /// Refined copy of `src`; the result aliases `src`.
    pub fn assume(&mut self, src: ValueId) -> ValueId {
        let dest = self.emit_value(|dest| Op::Assume { dest, src });
        self.code.values[dest.index()].alias_of = Some(src);
        dest
    }

    /// Binary operation.
    pub fn binop(&mut self, kind: BinopKind, left: ValueId, right: ValueId) -> ValueId {
        self.emit_value(|dest| Op::Binop {
            dest,
            kind,
            left,
            right,
        })
    }

    /// Addition.
    pub fn add(&mut self, left: ValueId, right: ValueId) -> ValueId {
        self.binop(BinopKind::Add, left, right)
    }

    /// Checked cast.
    pub fn check_cast(&mut self, src: ValueId, ty: TypeId) -> ValueId {
        self.emit_value(|dest| Op::CheckCast { dest, src, ty })
    }

    /// Array element read.
    pub fn array_get(&mut self, array: ValueId, index: ValueId) -> ValueId {
        self.emit_value(|dest| Op::ArrayGet { dest, array, index })
    }

    /// Array element write.
    pub fn array_put(&mut self, array: ValueId, index: ValueId, value: ValueId) {
        self.emit(Op::ArrayPut {
            array,
            index,
            value,
        });
    }

    // Fields and classes

    /// Instance field read.
    pub fn instance_get(&mut self, object: ValueId, field: FieldRef) -> ValueId {
        self.emit_value(|dest| Op::InstanceGet {
            dest,
            object,
            field,
        })
    }

    /// Instance field write.
    pub fn instance_put(&mut self, object: ValueId, field: FieldRef, value: ValueId) {
        self.emit(Op::InstancePut {
            object,
            field,
            value,
        });
    }

    /// Static field read.
    pub fn static_get(&mut self, field: FieldRef) -> ValueId {
        self.emit_value(|dest| Op::StaticGet { dest, field })
    }

    /// Static field write.
    pub fn static_put(&mut self, field: FieldRef, value: ValueId) {
        self.emit(Op::StaticPut { field, value });
    }

    /// Class-initialization check.
    pub fn init_class(&mut self, class: TypeId) -> ValueId {
        self.emit_value(|dest| Op::InitClass { dest, class })
    }

    /// Object allocation.
    pub fn new_instance(&mut self, class: TypeId) -> ValueId {
        self.emit_value(|dest| Op::NewInstance { dest, class })
    }

    // Calls and synchronization

    /// Void invocation.
    pub fn invoke(&mut self, kind: InvokeKind, method: MethodRef, args: &[ValueId]) {
        self.emit(Op::Invoke {
            dest: None,
            kind,
            method,
            args: args.to_vec(),
        });
    }

    /// Invocation producing a value.
    pub fn invoke_value(&mut self, kind: InvokeKind, method: MethodRef, args: &[ValueId]) -> ValueId {
        let args = args.to_vec();
        self.emit_value(|dest| Op::Invoke {
            dest: Some(dest),
            kind,
            method,
            args,
        })
    }

    /// Dynamically linked invocation.
    pub fn invoke_custom(&mut self, call_site: &str, args: &[ValueId]) {
        self.emit(Op::InvokeCustom {
            dest: None,
            call_site: Arc::from(call_site),
            args: args.to_vec(),
        });
    }

    /// Lock acquisition.
    pub fn monitor_enter(&mut self, object: ValueId) {
        self.emit(Op::MonitorEnter { object });
    }

    /// Lock release.
    pub fn monitor_exit(&mut self, object: ValueId) {
        self.emit(Op::MonitorExit { object });
    }

    /// The caught exception; first instruction of a handler block.
    pub fn move_exception(&mut self) -> ValueId {
        self.emit_value(|dest| Op::MoveException { dest })
    }

    // Terminators

    fn terminate(&mut self, op: Op, successors: Vec<usize>) {
        self.emit(op);
        self.block_mut().successors = successors;
    }

    /// Jump to `target`.
    pub fn goto(&mut self, target: usize) {
        self.terminate(Op::Goto, vec![target]);
    }

    /// Branch to `then` if the condition holds, to `otherwise` if not.
    pub fn if_(
        &mut self,
        kind: CompareKind,
        left: ValueId,
        right: Option<ValueId>,
        then: usize,
        otherwise: usize,
    ) {
        self.terminate(Op::If { kind, left, right }, vec![then, otherwise]);
    }

    /// Multi-way branch. `targets` pairs with `keys`.
    pub fn switch(&mut self, value: ValueId, keys: &[i32], targets: &[usize], default: usize) {
        let mut successors = targets.to_vec();
        successors.push(default);
        self.terminate(
            Op::Switch {
                value,
                keys: keys.to_vec(),
            },
            successors,
        );
    }

    /// Return `value`.
    pub fn return_value(&mut self, value: ValueId) {
        self.terminate(Op::Return { value: Some(value) }, Vec::new());
    }

    /// Return without value.
    pub fn return_void(&mut self) {
        self.terminate(Op::Return { value: None }, Vec::new());
    }

    /// Throw `exception`.
    pub fn throw(&mut self, exception: ValueId) {
        self.terminate(Op::Throw { exception }, Vec::new());
    }

    /// Finishes the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InconsistentCode`] if the body is malformed.
    pub fn finish(mut self) -> Result<MethodCode> {
        self.code.rebuild_predecessors();
        self.code.check_consistency()?;
        Ok(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_diamond() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        let flag = builder.argument(0);
        let left = builder.new_block();
        let right = builder.new_block();
        let join = builder.new_block();
        builder.if_(CompareKind::Ne, flag, None, left, right);
        builder.switch_to(left);
        let one = builder.const_number(1);
        builder.goto(join);
        builder.switch_to(right);
        let two = builder.const_number(2);
        builder.goto(join);
        builder.switch_to(join);
        let merged = builder.phi(&[one, two]);
        builder.return_value(merged);
        let code = builder.finish().unwrap();

        assert_eq!(code.blocks().len(), 4);
        assert_eq!(code.predecessors_of(join), &[left, right]);
        assert_eq!(code.predecessors_of(0), &[] as &[usize]);
    }

    #[test]
    fn test_handler_edges_are_predecessors() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        let handler = builder.new_block();
        let exit = builder.new_block();
        builder.add_handler(None, handler);
        builder.init_class(TypeId::new(0));
        builder.goto(exit);
        builder.switch_to(handler);
        let exception = builder.move_exception();
        builder.throw(exception);
        builder.switch_to(exit);
        builder.return_void();
        let code = builder.finish().unwrap();

        assert_eq!(code.predecessors_of(handler), &[0]);
        assert_eq!(code.block(0).unwrap().exceptional_exit(), Some(0));
    }

    #[test]
    fn test_unterminated_block_is_rejected() {
        let mut builder = CodeBuilder::new(MethodId::new(1));
        builder.const_number(1);
        assert!(matches!(
            builder.finish(),
            Err(Error::InconsistentCode { .. })
        ));
    }

    #[test]
    fn test_switch_successors() {
        let mut builder = CodeBuilder::new(MethodId::new(0));
        let value = builder.argument(0);
        let a = builder.new_block();
        let b = builder.new_block();
        builder.switch(value, &[1, 2], &[a, b], b);
        builder.switch_to(a);
        builder.return_void();
        builder.switch_to(b);
        builder.return_void();
        let code = builder.finish().unwrap();

        assert_eq!(code.block(0).unwrap().successors(), &[a, b, b]);
        assert_eq!(code.predecessors_of(b), &[0]);
    }
}
