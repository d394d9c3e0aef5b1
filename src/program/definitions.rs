//! Class, method and field definitions.

use std::sync::Arc;

use crate::program::{
    ClassFlags, ClassKind, FieldFlags, FieldId, FieldRef, MethodFlags, MethodId, MethodRef,
    TypeId, Visibility,
};

/// A class or interface definition.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Identity of the class.
    pub id: TypeId,
    /// Type descriptor, e.g. `Lcom/example/Foo;`.
    pub name: Arc<str>,
    /// Origin of the class.
    pub kind: ClassKind,
    /// Access flags.
    pub flags: ClassFlags,
    /// Direct superclass, `None` for the root class and for interfaces without one.
    pub superclass: Option<TypeId>,
    /// Directly implemented or extended interfaces.
    pub interfaces: Vec<TypeId>,
    /// Declared methods in declaration order.
    pub methods: Vec<MethodId>,
    /// Declared fields in declaration order.
    pub fields: Vec<FieldId>,
    /// Whether running the static initializer is known to be unobservable.
    pub clinit_side_effect_free: bool,
}

impl ClassDef {
    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::INTERFACE)
    }

    /// Returns `true` for classes of the program being optimized.
    #[must_use]
    pub fn is_program_class(&self) -> bool {
        self.kind == ClassKind::Program
    }

    /// Returns `true` for runtime library classes.
    #[must_use]
    pub fn is_library_class(&self) -> bool {
        self.kind == ClassKind::Library
    }

    /// Package part of the descriptor, e.g. `com/example` for `Lcom/example/Foo;`.
    #[must_use]
    pub fn package(&self) -> &str {
        package_of(&self.name)
    }
}

/// Returns the package of a type descriptor.
pub(crate) fn package_of(descriptor: &str) -> &str {
    let binary = descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(descriptor);
    binary.rfind('/').map_or("", |slash| &binary[..slash])
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Identity of the method.
    pub id: MethodId,
    /// The canonical reference naming this definition.
    pub reference: MethodRef,
    /// Access flags.
    pub flags: MethodFlags,
}

impl MethodDef {
    /// Declaring class.
    #[must_use]
    pub fn holder(&self) -> TypeId {
        self.reference.holder
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// Returns `true` for abstract methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodFlags::ABSTRACT)
    }

    /// Returns `true` for bridge methods.
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.flags.contains(MethodFlags::BRIDGE)
    }

    /// Returns `true` for `<init>` methods.
    #[must_use]
    pub fn is_instance_initializer(&self) -> bool {
        !self.is_static() && self.reference.is_instance_initializer()
    }

    /// Returns `true` for `<clinit>`.
    #[must_use]
    pub fn is_class_initializer(&self) -> bool {
        self.is_static() && &*self.reference.name == "<clinit>"
    }

    /// Returns `true` for methods that take part in virtual dispatch.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        !self.is_static()
            && !self.flags.contains(MethodFlags::PRIVATE)
            && !self.reference.is_instance_initializer()
    }

    /// Declared visibility.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.flags.visibility()
    }
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Identity of the field.
    pub id: FieldId,
    /// The canonical reference naming this definition.
    pub reference: FieldRef,
    /// Access flags.
    pub flags: FieldFlags,
    /// Set when the field is known to be unused.
    pub is_dead: bool,
}

impl FieldDef {
    /// Declaring class.
    #[must_use]
    pub fn holder(&self) -> TypeId {
        self.reference.holder
    }

    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }

    /// Returns `true` for final fields.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(FieldFlags::FINAL)
    }

    /// Returns `true` for volatile fields.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.flags.contains(FieldFlags::VOLATILE)
    }

    /// Returns `true` for `long` and `double` fields.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.reference.is_wide()
    }

    /// Declared visibility.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.flags.visibility()
    }
}
