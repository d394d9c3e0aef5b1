//! Incremental construction of a [`Program`].

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use rustc_hash::FxHashMap;

use crate::{
    ir::MethodCode,
    program::{
        model::{Liveness, TypeEntry},
        ClassDef, ClassFlags, ClassKind, FieldDef, FieldFlags, FieldId, FieldRef,
        InstanceInitializerInfo, MethodDef, MethodFlags, MethodId, MethodRef, Program, TypeId,
    },
};

/// Builds a [`Program`] class by class.
///
/// Types may be referenced before they are declared; a type that is never
/// declared stays a missing type that resolves to nothing.
///
/// # Example
///
/// ```rust
/// use shrinkwave::program::{FieldFlags, MethodFlags, ProgramBuilder};
///
/// let mut builder = ProgramBuilder::new();
/// let object = builder.library_class("Ljava/lang/Object;");
/// let point = builder.subclass("Lcom/example/Point;", object);
/// let x = builder.field(point, "x", "I", FieldFlags::PRIVATE);
/// let init = builder.method(point, "<init>", "(I)V", MethodFlags::PUBLIC);
/// let program = builder.build();
///
/// assert_eq!(program.program_methods(), vec![init]);
/// assert_eq!(program.field(x).holder(), point);
/// ```
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    types: Vec<TypeEntry>,
    type_index: FxHashMap<Arc<str>, TypeId>,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    codes: Vec<(MethodId, MethodCode)>,
    initializer_info: Vec<(MethodId, InstanceInitializerInfo)>,
    liveness: Option<Liveness>,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, creating a missing type if it is unknown.
    pub fn type_ref(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.type_index.get(name) {
            return id;
        }
        let id = TypeId::new(to_u32(self.types.len()));
        let name: Arc<str> = Arc::from(name);
        self.types.push(TypeEntry {
            name: Arc::clone(&name),
            class: None,
        });
        self.type_index.insert(name, id);
        id
    }

    /// Declares a class. Redeclaring a type replaces its definition.
    pub fn declare_class(
        &mut self,
        name: &str,
        kind: ClassKind,
        flags: ClassFlags,
        superclass: Option<TypeId>,
        interfaces: &[TypeId],
    ) -> TypeId {
        let id = self.type_ref(name);
        let entry = &mut self.types[id.index()];
        entry.class = Some(ClassDef {
            id,
            name: Arc::clone(&entry.name),
            kind,
            flags,
            superclass,
            interfaces: interfaces.to_vec(),
            methods: Vec::new(),
            fields: Vec::new(),
            clinit_side_effect_free: false,
        });
        id
    }

    /// Declares a public program class without superclass.
    pub fn class(&mut self, name: &str) -> TypeId {
        self.declare_class(name, ClassKind::Program, ClassFlags::PUBLIC, None, &[])
    }

    /// Declares a public program class extending `superclass`.
    pub fn subclass(&mut self, name: &str, superclass: TypeId) -> TypeId {
        self.declare_class(
            name,
            ClassKind::Program,
            ClassFlags::PUBLIC,
            Some(superclass),
            &[],
        )
    }

    /// Declares a public program interface.
    pub fn interface(&mut self, name: &str, extends: &[TypeId]) -> TypeId {
        self.declare_class(
            name,
            ClassKind::Program,
            ClassFlags::PUBLIC | ClassFlags::INTERFACE | ClassFlags::ABSTRACT,
            None,
            extends,
        )
    }

    /// Declares a public library class without superclass.
    pub fn library_class(&mut self, name: &str) -> TypeId {
        self.declare_class(name, ClassKind::Library, ClassFlags::PUBLIC, None, &[])
    }

    /// Declares whether running the static initializer of `class` is unobservable.
    pub fn set_clinit_side_effect_free(&mut self, class: TypeId, free: bool) {
        if let Some(definition) = self.class_mut(class) {
            definition.clinit_side_effect_free = free;
        }
    }

    fn class_mut(&mut self, class: TypeId) -> Option<&mut ClassDef> {
        self.types
            .get_mut(class.index())
            .and_then(|entry| entry.class.as_mut())
    }

    /// Declares a method on `holder`.
    pub fn method(&mut self, holder: TypeId, name: &str, proto: &str, flags: MethodFlags) -> MethodId {
        let id = MethodId::new(to_u32(self.methods.len()));
        self.methods.push(MethodDef {
            id,
            reference: MethodRef::new(holder, name, proto),
            flags,
        });
        if let Some(class) = self.class_mut(holder) {
            class.methods.push(id);
        }
        id
    }

    /// Declares a field on `holder`.
    pub fn field(&mut self, holder: TypeId, name: &str, ty: &str, flags: FieldFlags) -> FieldId {
        let id = FieldId::new(to_u32(self.fields.len()));
        self.fields.push(FieldDef {
            id,
            reference: FieldRef::new(holder, name, ty),
            flags,
            is_dead: false,
        });
        if let Some(class) = self.class_mut(holder) {
            class.fields.push(id);
        }
        id
    }

    /// The canonical reference of a declared method.
    #[must_use]
    pub fn method_ref(&self, method: MethodId) -> MethodRef {
        self.methods[method.index()].reference.clone()
    }

    /// The canonical reference of a declared field.
    #[must_use]
    pub fn field_ref(&self, field: FieldId) -> FieldRef {
        self.fields[field.index()].reference.clone()
    }

    /// Marks a field as unused.
    pub fn mark_field_dead(&mut self, field: FieldId) {
        if let Some(definition) = self.fields.get_mut(field.index()) {
            definition.is_dead = true;
        }
    }

    /// Attaches a body to `method`.
    pub fn body(&mut self, method: MethodId, code: MethodCode) {
        self.codes.push((method, code));
    }

    /// Records an instance initializer summary.
    pub fn initializer_info(&mut self, method: MethodId, info: InstanceInitializerInfo) {
        self.initializer_info.push((method, info));
    }

    /// Makes closed-world liveness facts available.
    pub fn enable_liveness(&mut self) {
        self.liveness.get_or_insert_with(Liveness::default);
    }

    /// Pins a method. Enables liveness.
    pub fn pin_method(&mut self, method: MethodId) {
        self.liveness
            .get_or_insert_with(Liveness::default)
            .pinned_methods
            .insert(method);
    }

    /// Pins a field. Enables liveness.
    pub fn pin_field(&mut self, field: FieldId) {
        self.liveness
            .get_or_insert_with(Liveness::default)
            .pinned_fields
            .insert(field);
    }

    /// Finishes the program and computes the subtype index.
    #[must_use]
    pub fn build(self) -> Program {
        let mut subtypes = vec![Vec::new(); self.types.len()];
        for entry in &self.types {
            let Some(class) = &entry.class else {
                continue;
            };
            for parent in class.superclass.iter().chain(class.interfaces.iter()) {
                if let Some(list) = subtypes.get_mut(parent.index()) {
                    list.push(class.id);
                }
            }
        }

        let codes = DashMap::new();
        for (method, code) in self.codes {
            codes.insert(method, code);
        }
        let initializer_info = DashMap::new();
        for (method, info) in self.initializer_info {
            initializer_info.insert(method, info);
        }

        Program {
            types: self.types,
            type_index: self.type_index,
            methods: self.methods,
            fields: self.fields,
            subtypes,
            codes,
            initializer_info,
            processed: Arc::new(DashSet::new()),
            liveness: self.liveness,
        }
    }
}

fn to_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
