//! Values of a method body.

use std::{fmt, sync::Arc};

use crate::{
    ir::Op,
    program::{FieldRef, Program, TypeId},
};

/// Identifies a value defined by an instruction or phi.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    /// Creates a value id from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Metadata of a value.
#[derive(Debug, Clone, Default)]
pub struct Value {
    /// Name of the source-level local bound to this value, if debug info is kept.
    pub local: Option<Arc<str>>,
    /// Set for values that are a refined copy of another value, such as the
    /// result of a non-null assumption.
    pub alias_of: Option<ValueId>,
}

impl Value {
    /// Returns `true` if a debugger can observe this value.
    #[must_use]
    pub fn has_local_info(&self) -> bool {
        self.local.is_some()
    }
}

/// A constant that can be re-created without executing the instruction that
/// originally produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SingleValue {
    /// An integral constant.
    Number(i64),
    /// The null reference.
    Null,
    /// A string constant.
    String(Arc<str>),
    /// The value of a static final field.
    StaticField(FieldRef),
}

impl SingleValue {
    /// Returns `true` if code in `context` can re-create this value.
    #[must_use]
    pub fn is_materializable_in_context(&self, program: &Program, context: TypeId) -> bool {
        match self {
            Self::Number(_) | Self::Null | Self::String(_) => true,
            Self::StaticField(reference) => program.resolve_field(reference).is_some_and(|field| {
                let definition = program.field(field);
                definition.is_static()
                    && program.is_accessible(definition.holder(), definition.visibility(), context)
            }),
        }
    }

    /// The instruction that re-creates this value into `dest`.
    #[must_use]
    pub fn materialize(&self, dest: ValueId) -> Op {
        match self {
            Self::Number(value) => Op::ConstNumber {
                dest,
                value: *value,
            },
            Self::Null => Op::ConstNull { dest },
            Self::String(value) => Op::ConstString {
                dest,
                value: Arc::clone(value),
            },
            Self::StaticField(field) => Op::StaticGet {
                dest,
                field: field.clone(),
            },
        }
    }
}

impl fmt::Display for SingleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Null => f.write_str("null"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::StaticField(field) => write!(f, "{field}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{FieldFlags, ProgramBuilder};

    #[test]
    fn test_constants_always_materializable() {
        let mut builder = ProgramBuilder::new();
        let class = builder.class("LA;");
        let program = builder.build();

        assert!(SingleValue::Number(1).is_materializable_in_context(&program, class));
        assert!(SingleValue::Null.is_materializable_in_context(&program, class));
        assert!(SingleValue::String("x".into()).is_materializable_in_context(&program, class));
    }

    #[test]
    fn test_static_field_needs_access() {
        let mut builder = ProgramBuilder::new();
        let owner = builder.class("Lp/Owner;");
        let neighbor = builder.class("Lp/Neighbor;");
        let stranger = builder.class("Lq/Stranger;");
        let hidden = builder.field(owner, "HIDDEN", "I", FieldFlags::STATIC | FieldFlags::FINAL);
        let shown = builder.field(
            owner,
            "SHOWN",
            "I",
            FieldFlags::STATIC | FieldFlags::FINAL | FieldFlags::PUBLIC,
        );
        let hidden = SingleValue::StaticField(builder.field_ref(hidden));
        let shown = SingleValue::StaticField(builder.field_ref(shown));
        let program = builder.build();

        assert!(hidden.is_materializable_in_context(&program, owner));
        assert!(hidden.is_materializable_in_context(&program, neighbor));
        assert!(!hidden.is_materializable_in_context(&program, stranger));
        assert!(shown.is_materializable_in_context(&program, stranger));
    }

    #[test]
    fn test_materialize() {
        let dest = ValueId::new(4);
        assert!(matches!(
            SingleValue::Number(9).materialize(dest),
            Op::ConstNumber { value: 9, .. }
        ));
        assert!(matches!(SingleValue::Null.materialize(dest), Op::ConstNull { .. }));
        assert_eq!(SingleValue::String("a".into()).to_string(), "\"a\"");
    }
}
