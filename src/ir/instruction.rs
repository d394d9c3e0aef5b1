//! Instructions.
//!
//! Instructions are in SSA form: every instruction defines at most one value
//! and refers to its operands by [`ValueId`]. Control transfers do not name
//! their targets; the successors of the enclosing block do.

use std::{fmt, sync::Arc};

use crate::{
    ir::ValueId,
    program::{FieldRef, MethodRef, TypeId},
};

/// Dispatch kind of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::IntoStaticStr)]
pub enum InvokeKind {
    /// Constructors and private methods.
    Direct,
    /// Static methods.
    Static,
    /// Class-based virtual dispatch.
    Virtual,
    /// Interface dispatch.
    Interface,
    /// Superclass method, dispatched statically.
    Super,
    /// Signature-polymorphic method handle invocation.
    Polymorphic,
}

impl InvokeKind {
    /// Returns `true` for kinds whose target depends on the runtime receiver type.
    #[must_use]
    pub fn is_dynamic_dispatch(self) -> bool {
        matches!(self, InvokeKind::Virtual | InvokeKind::Interface)
    }
}

/// Binary arithmetic and logic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinopKind {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division; throws on a zero divisor for integers.
    Div,
    /// Remainder; throws on a zero divisor for integers.
    Rem,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Shift left.
    Shl,
    /// Arithmetic shift right.
    Shr,
    /// Three-way comparison.
    Cmp,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnopKind {
    /// Negation.
    Neg,
    /// Bitwise complement.
    Not,
    /// Primitive conversion.
    Convert,
}

/// Conditions of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareKind {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Greater or equal.
    Ge,
    /// Greater than.
    Gt,
    /// Less or equal.
    Le,
}

/// The operation performed by an instruction.
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
pub enum Op {
    /// Method argument; index 0 is the receiver of instance methods.
    Argument {
        /// Defined value.
        dest: ValueId,
        /// Argument position.
        index: u16,
    },
    /// Array element read.
    ArrayGet {
        /// Defined value.
        dest: ValueId,
        /// The array.
        array: ValueId,
        /// The element index.
        index: ValueId,
    },
    /// Array length.
    ArrayLength {
        /// Defined value.
        dest: ValueId,
        /// The array.
        array: ValueId,
    },
    /// Array element write.
    ArrayPut {
        /// The array.
        array: ValueId,
        /// The element index.
        index: ValueId,
        /// The stored value.
        value: ValueId,
    },
    /// Refined copy of `src` carrying an assumption such as non-nullness.
    Assume {
        /// Defined value.
        dest: ValueId,
        /// The refined value.
        src: ValueId,
    },
    /// Binary operation.
    Binop {
        /// Defined value.
        dest: ValueId,
        /// Operator.
        kind: BinopKind,
        /// Left operand.
        left: ValueId,
        /// Right operand.
        right: ValueId,
    },
    /// Checked reference cast.
    CheckCast {
        /// Defined value.
        dest: ValueId,
        /// The cast value.
        src: ValueId,
        /// Target type.
        ty: TypeId,
    },
    /// Class literal.
    ConstClass {
        /// Defined value.
        dest: ValueId,
        /// The class.
        ty: TypeId,
    },
    /// Null constant.
    ConstNull {
        /// Defined value.
        dest: ValueId,
    },
    /// Numeric constant.
    ConstNumber {
        /// Defined value.
        dest: ValueId,
        /// The constant.
        value: i64,
    },
    /// String constant.
    ConstString {
        /// Defined value.
        dest: ValueId,
        /// The constant.
        value: Arc<str>,
    },
    /// Keeps the instruction's debug values alive for a debugger; no effect otherwise.
    DebugLocalRead,
    /// Unconditional jump to the single successor.
    Goto,
    /// Conditional branch; the first successor is taken when the condition holds.
    If {
        /// Condition.
        kind: CompareKind,
        /// Left operand.
        left: ValueId,
        /// Right operand, `None` to compare against zero.
        right: Option<ValueId>,
    },
    /// Triggers initialization of `class`.
    InitClass {
        /// Defined value, never used.
        dest: ValueId,
        /// The class to initialize.
        class: TypeId,
    },
    /// Instance field read.
    InstanceGet {
        /// Defined value.
        dest: ValueId,
        /// The receiver.
        object: ValueId,
        /// The field.
        field: FieldRef,
    },
    /// Type test.
    InstanceOf {
        /// Defined value.
        dest: ValueId,
        /// The tested value.
        src: ValueId,
        /// The tested type.
        ty: TypeId,
    },
    /// Instance field write.
    InstancePut {
        /// The receiver.
        object: ValueId,
        /// The field.
        field: FieldRef,
        /// The stored value.
        value: ValueId,
    },
    /// Method invocation.
    Invoke {
        /// Defined value, `None` for void methods.
        dest: Option<ValueId>,
        /// Dispatch kind.
        kind: InvokeKind,
        /// The invoked reference.
        method: MethodRef,
        /// Arguments, receiver first.
        args: Vec<ValueId>,
    },
    /// Dynamically linked call site.
    InvokeCustom {
        /// Defined value.
        dest: Option<ValueId>,
        /// Call-site descriptor.
        call_site: Arc<str>,
        /// Arguments.
        args: Vec<ValueId>,
    },
    /// Lock acquisition.
    MonitorEnter {
        /// The lock.
        object: ValueId,
    },
    /// Lock release.
    MonitorExit {
        /// The lock.
        object: ValueId,
    },
    /// The exception caught by the enclosing handler block.
    MoveException {
        /// Defined value.
        dest: ValueId,
    },
    /// Array allocation.
    NewArray {
        /// Defined value.
        dest: ValueId,
        /// Element count.
        size: ValueId,
        /// Array type.
        ty: TypeId,
    },
    /// Array allocation with initial elements.
    NewArrayFilled {
        /// Defined value.
        dest: ValueId,
        /// Array type.
        ty: TypeId,
        /// Elements.
        elements: Vec<ValueId>,
    },
    /// Object allocation; may trigger class initialization.
    NewInstance {
        /// Defined value.
        dest: ValueId,
        /// Allocated class.
        class: TypeId,
    },
    /// Method return.
    Return {
        /// Returned value, `None` for void.
        value: Option<ValueId>,
    },
    /// Static field read; may trigger class initialization.
    StaticGet {
        /// Defined value.
        dest: ValueId,
        /// The field.
        field: FieldRef,
    },
    /// Static field write; may trigger class initialization.
    StaticPut {
        /// The field.
        field: FieldRef,
        /// The stored value.
        value: ValueId,
    },
    /// Multi-way branch; successors are the cases in `keys` order, then the default.
    Switch {
        /// Scrutinee.
        value: ValueId,
        /// Case keys.
        keys: Vec<i32>,
    },
    /// Exception throw.
    Throw {
        /// The thrown exception.
        exception: ValueId,
    },
    /// Unary operation.
    Unop {
        /// Defined value.
        dest: ValueId,
        /// Operator.
        kind: UnopKind,
        /// Operand.
        src: ValueId,
    },
}

impl Op {
    /// Name of the operation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Value defined by this operation.
    #[must_use]
    pub fn dest(&self) -> Option<ValueId> {
        match self {
            Op::Argument { dest, .. }
            | Op::ArrayGet { dest, .. }
            | Op::ArrayLength { dest, .. }
            | Op::Assume { dest, .. }
            | Op::Binop { dest, .. }
            | Op::CheckCast { dest, .. }
            | Op::ConstClass { dest, .. }
            | Op::ConstNull { dest }
            | Op::ConstNumber { dest, .. }
            | Op::ConstString { dest, .. }
            | Op::InitClass { dest, .. }
            | Op::InstanceGet { dest, .. }
            | Op::InstanceOf { dest, .. }
            | Op::MoveException { dest }
            | Op::NewArray { dest, .. }
            | Op::NewArrayFilled { dest, .. }
            | Op::NewInstance { dest, .. }
            | Op::StaticGet { dest, .. }
            | Op::Unop { dest, .. } => Some(*dest),
            Op::Invoke { dest, .. } | Op::InvokeCustom { dest, .. } => *dest,
            Op::ArrayPut { .. }
            | Op::DebugLocalRead
            | Op::Goto
            | Op::If { .. }
            | Op::InstancePut { .. }
            | Op::MonitorEnter { .. }
            | Op::MonitorExit { .. }
            | Op::Return { .. }
            | Op::StaticPut { .. }
            | Op::Switch { .. }
            | Op::Throw { .. } => None,
        }
    }

    /// Values read by this operation.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Op::ArrayGet { array, index, .. } => vec![*array, *index],
            Op::ArrayLength { array, .. } => vec![*array],
            Op::ArrayPut {
                array,
                index,
                value,
            } => vec![*array, *index, *value],
            Op::Assume { src, .. }
            | Op::CheckCast { src, .. }
            | Op::InstanceOf { src, .. }
            | Op::Unop { src, .. } => vec![*src],
            Op::Binop { left, right, .. } => vec![*left, *right],
            Op::If { left, right, .. } => {
                let mut operands = vec![*left];
                operands.extend(right.iter().copied());
                operands
            }
            Op::InstanceGet { object, .. } => vec![*object],
            Op::InstancePut { object, value, .. } => vec![*object, *value],
            Op::Invoke { args, .. } | Op::InvokeCustom { args, .. } => args.clone(),
            Op::MonitorEnter { object } | Op::MonitorExit { object } => vec![*object],
            Op::NewArray { size, .. } => vec![*size],
            Op::NewArrayFilled { elements, .. } => elements.clone(),
            Op::Return { value } => value.iter().copied().collect(),
            Op::StaticPut { value, .. } | Op::Switch { value, .. } => vec![*value],
            Op::Throw { exception } => vec![*exception],
            Op::Argument { .. }
            | Op::ConstClass { .. }
            | Op::ConstNull { .. }
            | Op::ConstNumber { .. }
            | Op::ConstString { .. }
            | Op::DebugLocalRead
            | Op::Goto
            | Op::InitClass { .. }
            | Op::MoveException { .. }
            | Op::NewInstance { .. }
            | Op::StaticGet { .. } => Vec::new(),
        }
    }

    /// Mutable references to every operand.
    pub fn operands_mut(&mut self) -> Vec<&mut ValueId> {
        match self {
            Op::ArrayGet { array, index, .. } => vec![array, index],
            Op::ArrayLength { array, .. } => vec![array],
            Op::ArrayPut {
                array,
                index,
                value,
            } => vec![array, index, value],
            Op::Assume { src, .. }
            | Op::CheckCast { src, .. }
            | Op::InstanceOf { src, .. }
            | Op::Unop { src, .. } => vec![src],
            Op::Binop { left, right, .. } => vec![left, right],
            Op::If { left, right, .. } => {
                let mut operands = vec![left];
                operands.extend(right.iter_mut());
                operands
            }
            Op::InstanceGet { object, .. } => vec![object],
            Op::InstancePut { object, value, .. } => vec![object, value],
            Op::Invoke { args, .. } | Op::InvokeCustom { args, .. } => args.iter_mut().collect(),
            Op::MonitorEnter { object } | Op::MonitorExit { object } => vec![object],
            Op::NewArray { size, .. } => vec![size],
            Op::NewArrayFilled { elements, .. } => elements.iter_mut().collect(),
            Op::Return { value } => value.iter_mut().collect(),
            Op::StaticPut { value, .. } | Op::Switch { value, .. } => vec![value],
            Op::Throw { exception } => vec![exception],
            Op::Argument { .. }
            | Op::ConstClass { .. }
            | Op::ConstNull { .. }
            | Op::ConstNumber { .. }
            | Op::ConstString { .. }
            | Op::DebugLocalRead
            | Op::Goto
            | Op::InitClass { .. }
            | Op::MoveException { .. }
            | Op::NewInstance { .. }
            | Op::StaticGet { .. } => Vec::new(),
        }
    }

    /// Returns `true` if executing the operation may raise an exception.
    #[must_use]
    pub fn can_throw(&self) -> bool {
        match self {
            Op::Binop { kind, .. } => matches!(kind, BinopKind::Div | BinopKind::Rem),
            Op::ArrayGet { .. }
            | Op::ArrayLength { .. }
            | Op::ArrayPut { .. }
            | Op::CheckCast { .. }
            | Op::ConstClass { .. }
            | Op::InitClass { .. }
            | Op::InstanceGet { .. }
            | Op::InstancePut { .. }
            | Op::Invoke { .. }
            | Op::InvokeCustom { .. }
            | Op::MonitorEnter { .. }
            | Op::MonitorExit { .. }
            | Op::NewArray { .. }
            | Op::NewArrayFilled { .. }
            | Op::NewInstance { .. }
            | Op::StaticGet { .. }
            | Op::StaticPut { .. }
            | Op::Throw { .. } => true,
            Op::Argument { .. }
            | Op::Assume { .. }
            | Op::ConstNull { .. }
            | Op::ConstNumber { .. }
            | Op::ConstString { .. }
            | Op::DebugLocalRead
            | Op::Goto
            | Op::If { .. }
            | Op::InstanceOf { .. }
            | Op::MoveException { .. }
            | Op::Return { .. }
            | Op::Switch { .. }
            | Op::Unop { .. } => false,
        }
    }

    /// Returns `true` for operations that end a block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Goto | Op::If { .. } | Op::Switch { .. } | Op::Return { .. } | Op::Throw { .. }
        )
    }

    /// Number of normal successors a block ending in this operation needs,
    /// or `None` if it is not a terminator.
    #[must_use]
    pub fn successor_count(&self) -> Option<usize> {
        match self {
            Op::Goto => Some(1),
            Op::If { .. } => Some(2),
            Op::Switch { keys, .. } => Some(keys.len() + 1),
            Op::Return { .. } | Op::Throw { .. } => Some(0),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dest) = self.dest() {
            write!(f, "{dest} = ")?;
        }
        f.write_str(self.name())?;
        match self {
            Op::InstanceGet { field, .. }
            | Op::InstancePut { field, .. }
            | Op::StaticGet { field, .. }
            | Op::StaticPut { field, .. } => write!(f, " {field}")?,
            Op::Invoke { method, .. } => write!(f, " {method}")?,
            Op::InitClass { class, .. } | Op::NewInstance { class, .. } => write!(f, " {class}")?,
            Op::ConstNumber { value, .. } => write!(f, " {value}")?,
            _ => {}
        }
        for operand in self.operands() {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

/// An operation together with the values a debugger keeps alive at this point.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation.
    pub op: Op,
    /// Locals whose live range ends here. They count as uses.
    pub debug_values: Vec<ValueId>,
}

impl Instruction {
    /// Wraps an operation without debug values.
    #[must_use]
    pub fn new(op: Op) -> Self {
        Self {
            op,
            debug_values: Vec::new(),
        }
    }

    /// All values read, including debug values.
    #[must_use]
    pub fn uses(&self) -> Vec<ValueId> {
        let mut uses = self.op.operands();
        uses.extend(self.debug_values.iter().copied());
        uses
    }
}

impl From<Op> for Instruction {
    fn from(op: Op) -> Self {
        Instruction::new(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(index: u32) -> ValueId {
        ValueId::new(index)
    }

    #[test]
    fn test_dest_and_operands() {
        let op = Op::InstancePut {
            object: v(0),
            field: FieldRef::new(TypeId::new(0), "f", "I"),
            value: v(1),
        };
        assert_eq!(op.dest(), None);
        assert_eq!(op.operands(), vec![v(0), v(1)]);

        let op = Op::Invoke {
            dest: Some(v(5)),
            kind: InvokeKind::Static,
            method: MethodRef::new(TypeId::new(0), "m", "(II)I"),
            args: vec![v(1), v(2)],
        };
        assert_eq!(op.dest(), Some(v(5)));
        assert_eq!(op.operands(), vec![v(1), v(2)]);
        assert_eq!(op.name(), "Invoke");
    }

    #[test]
    fn test_operands_mut() {
        let mut op = Op::Binop {
            dest: v(3),
            kind: BinopKind::Add,
            left: v(1),
            right: v(1),
        };
        for operand in op.operands_mut() {
            *operand = v(2);
        }
        assert_eq!(op.operands(), vec![v(2), v(2)]);
    }

    #[test]
    fn test_can_throw() {
        assert!(Op::InitClass {
            dest: v(0),
            class: TypeId::new(0)
        }
        .can_throw());
        assert!(!Op::ConstNull { dest: v(0) }.can_throw());
        assert!(Op::Binop {
            dest: v(2),
            kind: BinopKind::Div,
            left: v(0),
            right: v(1)
        }
        .can_throw());
        assert!(!Op::Binop {
            dest: v(2),
            kind: BinopKind::Add,
            left: v(0),
            right: v(1)
        }
        .can_throw());
    }

    #[test]
    fn test_terminators() {
        assert!(Op::Goto.is_terminator());
        assert_eq!(Op::Goto.successor_count(), Some(1));
        let switch = Op::Switch {
            value: v(0),
            keys: vec![1, 2, 3],
        };
        assert_eq!(switch.successor_count(), Some(4));
        assert_eq!(Op::ConstNull { dest: v(0) }.successor_count(), None);
    }

    #[test]
    fn test_dynamic_dispatch_kinds() {
        use strum::IntoEnumIterator;
        let dynamic: Vec<InvokeKind> = InvokeKind::iter()
            .filter(|kind| kind.is_dynamic_dispatch())
            .collect();
        assert_eq!(dynamic, vec![InvokeKind::Virtual, InvokeKind::Interface]);
    }

    #[test]
    fn test_display() {
        let op = Op::InstanceGet {
            dest: v(2),
            object: v(0),
            field: FieldRef::new(TypeId::new(1), "x", "I"),
        };
        assert_eq!(op.to_string(), "v2 = InstanceGet t1.x:I v0");
    }
}
