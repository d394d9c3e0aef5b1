//! The closed program and its resolution queries.

use std::{collections::VecDeque, sync::Arc};

use dashmap::{mapref::one::Ref, DashMap, DashSet};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ir::{InvokeKind, MethodCode, Op},
    program::{
        definitions::package_of, ClassDef, FieldDef, FieldFlags, FieldId, FieldRef,
        InstanceInitializerInfo, MethodDef, MethodId, MethodRef, TypeId, Visibility,
    },
    Result,
};

/// A type known to the program, possibly without a definition.
#[derive(Debug, Clone)]
pub(crate) struct TypeEntry {
    pub(crate) name: Arc<str>,
    pub(crate) class: Option<ClassDef>,
}

/// Closed-world facts computed by reachability analysis.
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    pub(crate) pinned_methods: FxHashSet<MethodId>,
    pub(crate) pinned_fields: FxHashSet<FieldId>,
}

impl Liveness {
    /// Returns `true` if `method` is kept by an external rule.
    #[must_use]
    pub fn is_pinned(&self, method: MethodId) -> bool {
        self.pinned_methods.contains(&method)
    }

    /// Returns `true` if `field` is kept by an external rule.
    #[must_use]
    pub fn is_pinned_field(&self, field: FieldId) -> bool {
        self.pinned_fields.contains(&field)
    }
}

/// Classes, members and method bodies of the program being optimized.
///
/// Definitions are immutable once built, except for synthesized fields. Method
/// bodies live in a concurrent map so that the methods of one scheduling wave
/// can be taken out, rewritten and put back by different workers.
#[derive(Debug)]
pub struct Program {
    pub(crate) types: Vec<TypeEntry>,
    pub(crate) type_index: FxHashMap<Arc<str>, TypeId>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) fields: Vec<FieldDef>,
    /// Direct subtypes per type.
    pub(crate) subtypes: Vec<Vec<TypeId>>,
    pub(crate) codes: DashMap<MethodId, MethodCode>,
    pub(crate) initializer_info: DashMap<MethodId, InstanceInitializerInfo>,
    pub(crate) processed: Arc<DashSet<MethodId>>,
    pub(crate) liveness: Option<Liveness>,
}

impl Program {
    /// Number of known types, including missing ones.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Returns the descriptor of `ty`.
    #[must_use]
    pub fn type_name(&self, ty: TypeId) -> &str {
        self.types.get(ty.index()).map_or("<unknown>", |entry| &entry.name)
    }

    /// Looks up a type by descriptor.
    #[must_use]
    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.type_index.get(name).copied()
    }

    /// Returns the definition of `ty`, or `None` for missing types.
    #[must_use]
    pub fn class(&self, ty: TypeId) -> Option<&ClassDef> {
        self.types.get(ty.index()).and_then(|entry| entry.class.as_ref())
    }

    /// Iterates over all defined classes in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.types.iter().filter_map(|entry| entry.class.as_ref())
    }

    /// Returns the definition of `method`.
    ///
    /// # Panics
    ///
    /// Panics if `method` was not created by this program's builder.
    #[must_use]
    pub fn method(&self, method: MethodId) -> &MethodDef {
        &self.methods[method.index()]
    }

    /// Returns the definition of `field`.
    ///
    /// # Panics
    ///
    /// Panics if `field` was not created by this program.
    #[must_use]
    pub fn field(&self, field: FieldId) -> &FieldDef {
        &self.fields[field.index()]
    }

    /// Human readable `Holder.name(proto)` label of a method.
    #[must_use]
    pub fn method_label(&self, method: MethodId) -> String {
        let reference = &self.method(method).reference;
        format!(
            "{}.{}{}",
            self.type_name(reference.holder),
            reference.name,
            reference.proto
        )
    }

    /// All methods declared by program classes, in class declaration order.
    #[must_use]
    pub fn program_methods(&self) -> Vec<MethodId> {
        self.classes()
            .filter(|class| class.is_program_class())
            .flat_map(|class| class.methods.iter().copied())
            .collect()
    }

    /// Returns `true` if `method` is declared by a program class.
    #[must_use]
    pub fn is_program_method(&self, method: MethodId) -> bool {
        self.class(self.method(method).holder())
            .is_some_and(ClassDef::is_program_class)
    }

    // Subtyping

    /// Returns `true` if `sub` is `sup` or inherits from it.
    #[must_use]
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([sub]);
        while let Some(ty) = queue.pop_front() {
            if !visited.insert(ty) {
                continue;
            }
            let Some(class) = self.class(ty) else {
                continue;
            };
            for parent in class.superclass.iter().chain(class.interfaces.iter()) {
                if *parent == sup {
                    return true;
                }
                queue.push_back(*parent);
            }
        }
        false
    }

    /// All transitive subtypes of `ty`, excluding `ty`, in breadth-first order.
    #[must_use]
    pub fn subtypes(&self, ty: TypeId) -> Vec<TypeId> {
        let mut result = Vec::new();
        let mut visited = FxHashSet::default();
        visited.insert(ty);
        let mut queue = VecDeque::from([ty]);
        while let Some(current) = queue.pop_front() {
            let Some(direct) = self.subtypes.get(current.index()) else {
                continue;
            };
            for &sub in direct {
                if visited.insert(sub) {
                    result.push(sub);
                    queue.push_back(sub);
                }
            }
        }
        result
    }

    // Method resolution

    fn declared_method(&self, ty: TypeId, name: &str, proto: &str) -> Option<MethodId> {
        self.class(ty)?
            .methods
            .iter()
            .copied()
            .find(|&m| self.method(m).reference.matches_signature(name, proto))
    }

    /// Looks `name`/`proto` up along the superclass chain of `ty`, then in
    /// the superinterfaces of every class on that chain.
    fn lookup_in_hierarchy(&self, ty: TypeId, name: &str, proto: &str) -> Option<MethodId> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(class_ty) = current {
            if chain.contains(&class_ty) {
                break;
            }
            if let Some(found) = self.declared_method(class_ty, name, proto) {
                return Some(found);
            }
            chain.push(class_ty);
            current = self.class(class_ty).and_then(|class| class.superclass);
        }

        let mut visited = FxHashSet::default();
        let mut queue: VecDeque<TypeId> = chain
            .iter()
            .filter_map(|&ty| self.class(ty))
            .flat_map(|class| class.interfaces.iter().copied())
            .collect();
        let mut abstract_match = None;
        while let Some(iface) = queue.pop_front() {
            if !visited.insert(iface) {
                continue;
            }
            if let Some(found) = self.declared_method(iface, name, proto) {
                if !self.method(found).is_abstract() {
                    return Some(found);
                }
                abstract_match.get_or_insert(found);
            }
            if let Some(class) = self.class(iface) {
                queue.extend(class.interfaces.iter().copied());
            }
        }
        abstract_match
    }

    /// Resolves an invoked reference to the definition it binds to.
    ///
    /// Returns `None` when no definition exists or when the definition does
    /// not fit the invocation kind (a static invoke of an instance method or
    /// the other way round).
    #[must_use]
    pub fn resolve_method(&self, kind: InvokeKind, method: &MethodRef) -> Option<MethodId> {
        let found = self.lookup_in_hierarchy(method.holder, &method.name, &method.proto)?;
        let definition = self.method(found);
        let fits = match kind {
            InvokeKind::Static => definition.is_static(),
            InvokeKind::Direct
            | InvokeKind::Virtual
            | InvokeKind::Interface
            | InvokeKind::Super
            | InvokeKind::Polymorphic => !definition.is_static(),
        };
        fits.then_some(found)
    }

    /// All non-abstract methods a virtual call resolving to `method` may dispatch to.
    ///
    /// This is `method` itself plus every override declared in a subtype of
    /// its holder. Non-virtual methods only dispatch to themselves.
    #[must_use]
    pub fn lookup_virtual_targets(&self, method: MethodId) -> Vec<MethodId> {
        let definition = self.method(method);
        if !definition.is_virtual() {
            return vec![method];
        }
        if self
            .class(definition.holder())
            .is_some_and(ClassDef::is_interface)
        {
            return self.lookup_interface_targets(method);
        }

        let reference = &definition.reference;
        let mut targets = Vec::new();
        if !definition.is_abstract() {
            targets.push(method);
        }
        for sub in self.subtypes(definition.holder()) {
            if let Some(found) = self.declared_method(sub, &reference.name, &reference.proto) {
                let candidate = self.method(found);
                if candidate.is_virtual() && !candidate.is_abstract() {
                    targets.push(found);
                }
            }
        }
        targets
    }

    /// All non-abstract methods an interface call resolving to `method` may
    /// dispatch to, including implementations inherited by implementing classes.
    #[must_use]
    pub fn lookup_interface_targets(&self, method: MethodId) -> Vec<MethodId> {
        let definition = self.method(method);
        let reference = &definition.reference;
        let mut seen = FxHashSet::default();
        let mut targets = Vec::new();
        if !definition.is_abstract() && seen.insert(method) {
            targets.push(method);
        }
        for sub in self.subtypes(definition.holder()) {
            let Some(class) = self.class(sub) else {
                continue;
            };
            if class.is_interface() {
                if let Some(found) = self.declared_method(sub, &reference.name, &reference.proto)
                {
                    if !self.method(found).is_abstract() && seen.insert(found) {
                        targets.push(found);
                    }
                }
                continue;
            }
            if let Some(found) = self.lookup_in_hierarchy(sub, &reference.name, &reference.proto) {
                let candidate = self.method(found);
                if candidate.is_virtual() && !candidate.is_abstract() && seen.insert(found) {
                    targets.push(found);
                }
            }
        }
        targets
    }

    // Field resolution

    fn declared_field(&self, ty: TypeId, field: &FieldRef) -> Option<FieldId> {
        self.class(ty)?.fields.iter().copied().find(|&f| {
            let reference = &self.field(f).reference;
            reference.name == field.name && reference.ty == field.ty
        })
    }

    /// Resolves a field reference: declared fields first, then
    /// superinterfaces, then the superclass.
    #[must_use]
    pub fn resolve_field(&self, field: &FieldRef) -> Option<FieldId> {
        let mut visited = FxHashSet::default();
        self.resolve_field_in(field.holder, field, &mut visited)
    }

    fn resolve_field_in(
        &self,
        ty: TypeId,
        field: &FieldRef,
        visited: &mut FxHashSet<TypeId>,
    ) -> Option<FieldId> {
        if !visited.insert(ty) {
            return None;
        }
        if let Some(found) = self.declared_field(ty, field) {
            return Some(found);
        }
        let class = self.class(ty)?;
        for &iface in &class.interfaces {
            if let Some(found) = self.resolve_field_in(iface, field, visited) {
                return Some(found);
            }
        }
        let superclass = class.superclass?;
        self.resolve_field_in(superclass, field, visited)
    }

    /// Looks up a field declared directly on its reference's holder.
    #[must_use]
    pub fn definition_for_field(&self, field: &FieldRef) -> Option<FieldId> {
        self.declared_field(field.holder, field)
    }

    /// Returns `true` if values stored in `field` may be propagated to its reads.
    #[must_use]
    pub fn may_propagate_value_for(&self, field: FieldId) -> bool {
        let definition = self.field(field);
        if definition.is_volatile() {
            return false;
        }
        self.liveness
            .as_ref()
            .map_or(true, |liveness| !liveness.is_pinned_field(field))
    }

    /// Returns `true` if `member` declared with `visibility` on `holder` can
    /// be accessed from code in `context`.
    #[must_use]
    pub fn is_accessible(&self, holder: TypeId, visibility: Visibility, context: TypeId) -> bool {
        if holder == context {
            return true;
        }
        let same_package = package_of(self.type_name(holder)) == package_of(self.type_name(context));
        match visibility {
            Visibility::Public => true,
            Visibility::Protected => same_package || self.is_subtype(context, holder),
            Visibility::PackagePrivate => same_package,
            Visibility::Private => false,
        }
    }

    // Class initialization

    /// Returns `true` if instantiating `class` from code in `context` may run
    /// a static initializer with observable effects.
    ///
    /// Supertypes of `context` are already initialized when code of `context`
    /// runs, so initialization stops there.
    #[must_use]
    pub fn class_initialization_may_have_side_effects(
        &self,
        class: TypeId,
        context: TypeId,
    ) -> bool {
        let mut current = Some(class);
        let mut visited = FxHashSet::default();
        while let Some(ty) = current {
            if !visited.insert(ty) || self.is_subtype(context, ty) {
                return false;
            }
            let Some(definition) = self.class(ty) else {
                return true;
            };
            if !definition.clinit_side_effect_free
                && (definition.is_library_class() || self.has_class_initializer(ty))
            {
                return true;
            }
            current = definition.superclass;
        }
        false
    }

    /// Returns `true` if `ty` declares a `<clinit>`.
    #[must_use]
    pub fn has_class_initializer(&self, ty: TypeId) -> bool {
        self.class(ty).is_some_and(|class| {
            class
                .methods
                .iter()
                .any(|&m| self.method(m).is_class_initializer())
        })
    }

    /// Minimum visibility an init field of each class needs, derived from
    /// the init-class instructions in program method bodies.
    #[must_use]
    pub fn init_class_references(&self) -> Vec<(TypeId, Visibility)> {
        let mut required: FxHashMap<TypeId, Visibility> = FxHashMap::default();
        for method in self.program_methods() {
            let Some(code) = self.codes.get(&method) else {
                continue;
            };
            let context = self.method(method).holder();
            for instruction in code.instructions() {
                let Op::InitClass { class, .. } = &instruction.op else {
                    continue;
                };
                let class = *class;
                let visibility = if package_of(self.type_name(class))
                    == package_of(self.type_name(context))
                {
                    Visibility::PackagePrivate
                } else if self.is_subtype(context, class) {
                    Visibility::Protected
                } else {
                    Visibility::Public
                };
                let entry = required.entry(class).or_insert(visibility);
                *entry = (*entry).max(visibility);
            }
        }
        let mut references: Vec<_> = required.into_iter().collect();
        references.sort_unstable();
        references
    }

    /// Appends a new static field to a program class.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if `holder` is not a program class.
    pub fn add_static_field(
        &mut self,
        holder: TypeId,
        name: &str,
        ty: &str,
        flags: FieldFlags,
    ) -> Result<FieldId> {
        if !self.class(holder).is_some_and(ClassDef::is_program_class) {
            return Err(invariant_error!(
                "cannot add field {} to non-program type {}",
                name,
                self.type_name(holder)
            ));
        }
        let id = FieldId::new(u32::try_from(self.fields.len()).map_err(|_| {
            invariant_error!("field index overflow")
        })?);
        self.fields.push(FieldDef {
            id,
            reference: FieldRef::new(holder, name, ty),
            flags: flags | FieldFlags::STATIC,
            is_dead: false,
        });
        if let Some(class) = self
            .types
            .get_mut(holder.index())
            .and_then(|entry| entry.class.as_mut())
        {
            class.fields.push(id);
        }
        Ok(id)
    }

    // Liveness

    /// Closed-world facts, if reachability analysis ran.
    #[must_use]
    pub fn liveness(&self) -> Option<&Liveness> {
        self.liveness.as_ref()
    }

    /// Returns `true` if `method` is kept by an external rule.
    #[must_use]
    pub fn is_pinned(&self, method: MethodId) -> bool {
        self.liveness
            .as_ref()
            .is_some_and(|liveness| liveness.is_pinned(method))
    }

    // Bodies

    /// Returns the body of `method`, if it has one and it is not being processed.
    #[must_use]
    pub fn code(&self, method: MethodId) -> Option<Ref<'_, MethodId, MethodCode>> {
        self.codes.get(&method)
    }

    /// Takes the body of `method` out of the program for processing.
    #[must_use]
    pub fn take_code(&self, method: MethodId) -> Option<MethodCode> {
        self.codes.remove(&method).map(|(_, code)| code)
    }

    /// Installs a body for `method`.
    pub fn put_code(&self, method: MethodId, code: MethodCode) {
        self.codes.insert(method, code);
    }

    // Optimization info

    /// Returns the recorded summary of an instance initializer.
    #[must_use]
    pub fn instance_initializer_info(&self, method: MethodId) -> Option<InstanceInitializerInfo> {
        self.initializer_info.get(&method).map(|info| info.clone())
    }

    /// Records the summary of an instance initializer.
    pub fn record_instance_initializer_info(
        &self,
        method: MethodId,
        info: InstanceInitializerInfo,
    ) {
        self.initializer_info.insert(method, info);
    }

    // Processing state

    /// Shared set of processed methods.
    #[must_use]
    pub fn processed_methods(&self) -> Arc<DashSet<MethodId>> {
        Arc::clone(&self.processed)
    }

    /// Returns `true` once `method` has been processed.
    #[must_use]
    pub fn is_processed(&self, method: MethodId) -> bool {
        self.processed.contains(&method)
    }

    /// Marks `method` as processed.
    pub fn mark_processed(&self, method: MethodId) {
        self.processed.insert(method);
    }
}
