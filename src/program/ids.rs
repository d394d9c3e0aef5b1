//! Identifiers and symbolic references.
//!
//! Definitions are addressed by dense ids handed out by the [`ProgramBuilder`](super::ProgramBuilder).
//! Instructions refer to members symbolically through [`MethodRef`] and [`FieldRef`]; resolving a
//! reference yields the id of the definition it binds to.

use std::{fmt, sync::Arc};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Creates an id from a raw index.
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

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a class, interface or referenced-but-missing type.
    TypeId,
    "t"
);
define_id!(
    /// Identifies a method definition.
    MethodId,
    "m"
);
define_id!(
    /// Identifies a field definition.
    FieldId,
    "f"
);

/// Symbolic reference to a method, as it appears at an invocation site.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// The class the reference names as holder.
    pub holder: TypeId,
    /// Method name.
    pub name: Arc<str>,
    /// Method descriptor, e.g. `(I)V`.
    pub proto: Arc<str>,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(holder: TypeId, name: impl Into<Arc<str>>, proto: impl Into<Arc<str>>) -> Self {
        Self {
            holder,
            name: name.into(),
            proto: proto.into(),
        }
    }

    /// Returns `true` if name and descriptor match, regardless of the holder.
    #[must_use]
    pub fn matches_signature(&self, name: &str, proto: &str) -> bool {
        &*self.name == name && &*self.proto == proto
    }

    /// Returns `true` for `<init>` references.
    #[must_use]
    pub fn is_instance_initializer(&self) -> bool {
        &*self.name == "<init>"
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.holder, self.name, self.proto)
    }
}

/// Symbolic reference to a field, as it appears in a field instruction.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    /// The class the reference names as holder.
    pub holder: TypeId,
    /// Field name.
    pub name: Arc<str>,
    /// Field type descriptor, e.g. `I` or `Ljava/lang/String;`.
    pub ty: Arc<str>,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(holder: TypeId, name: impl Into<Arc<str>>, ty: impl Into<Arc<str>>) -> Self {
        Self {
            holder,
            name: name.into(),
            ty: ty.into(),
        }
    }

    /// Returns `true` for `long` and `double` fields, which occupy two registers.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(&*self.ty, "J" | "D")
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.holder, self.name, self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_formatting() {
        assert_eq!(MethodId::new(3).to_string(), "m3");
        assert_eq!(format!("{:?}", FieldId::new(1)), "FieldId(1)");
        assert_eq!(TypeId::new(2).index(), 2);
    }

    #[test]
    fn test_method_ref() {
        let reference = MethodRef::new(TypeId::new(0), "<init>", "()V");
        assert!(reference.is_instance_initializer());
        assert!(reference.matches_signature("<init>", "()V"));
        assert!(!reference.matches_signature("<init>", "(I)V"));
        assert_eq!(reference.to_string(), "t0.<init>()V");
    }

    #[test]
    fn test_field_ref_width() {
        assert!(FieldRef::new(TypeId::new(0), "a", "J").is_wide());
        assert!(FieldRef::new(TypeId::new(0), "b", "D").is_wide());
        assert!(!FieldRef::new(TypeId::new(0), "c", "I").is_wide());
    }
}
