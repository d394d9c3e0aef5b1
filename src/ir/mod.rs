//! SSA intermediate representation of method bodies.
//!
//! A [`MethodCode`] is a control-flow graph of [`BasicBlock`]s. Each block
//! holds phis followed by [`Instruction`]s and ends in a terminator. Bodies
//! are built with [`CodeBuilder`] and rewritten in place by optimization
//! passes.

mod block;
mod builder;
mod code;
mod instruction;
mod value;

pub use block::{BasicBlock, CatchHandler, Phi};
pub use builder::CodeBuilder;
pub use code::MethodCode;
pub use instruction::{BinopKind, CompareKind, Instruction, InvokeKind, Op, UnopKind};
pub use value::{SingleValue, Value, ValueId};
