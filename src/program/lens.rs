//! Identity mappings established by earlier transformations.
//!
//! A [`GraphLens`] translates method references written before a renaming or
//! merging step into the references that are valid now. The [`InitClassLens`]
//! records, per class, the static field whose read triggers the class's
//! initialization.

use dashmap::DashMap;
use rustc_hash::FxHashMap;

use crate::program::{FieldId, MethodRef, TypeId};

/// Maps method references through the transformations applied so far.
pub trait GraphLens: Send + Sync {
    /// Returns the reference `method` denotes after all applied renamings and merges.
    fn lookup_method(&self, method: &MethodRef) -> MethodRef;
}

/// The lens of a program no transformation has touched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityLens;

impl GraphLens for IdentityLens {
    fn lookup_method(&self, method: &MethodRef) -> MethodRef {
        method.clone()
    }
}

/// Explicit method renames and merges.
#[derive(Debug, Default, Clone)]
pub struct MethodMappingLens {
    mapping: FxHashMap<MethodRef, MethodRef>,
}

impl MethodMappingLens {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirects `from` to `to`.
    pub fn map(&mut self, from: MethodRef, to: MethodRef) {
        self.mapping.insert(from, to);
    }

    /// Number of mapped references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

impl GraphLens for MethodMappingLens {
    fn lookup_method(&self, method: &MethodRef) -> MethodRef {
        self.mapping
            .get(method)
            .cloned()
            .unwrap_or_else(|| method.clone())
    }
}

/// Class → field used to express class-initialization checks.
#[derive(Debug, Default, Clone)]
pub struct InitClassLens {
    fields: FxHashMap<TypeId, FieldId>,
}

impl InitClassLens {
    /// Returns the field standing in for initialization of `class`.
    #[must_use]
    pub fn init_field(&self, class: TypeId) -> Option<FieldId> {
        self.fields.get(&class).copied()
    }

    /// Number of mapped classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no class is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over all mappings, ordered by class.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, FieldId)> + '_ {
        let mut entries: Vec<(TypeId, FieldId)> =
            self.fields.iter().map(|(&ty, &field)| (ty, field)).collect();
        entries.sort_unstable();
        entries.into_iter()
    }
}

/// Concurrent collector for an [`InitClassLens`].
///
/// Writers for different classes never interact, so the mappings can be
/// recorded from any number of workers in any order.
#[derive(Debug, Default)]
pub struct InitClassLensBuilder {
    fields: DashMap<TypeId, FieldId>,
}

impl InitClassLensBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `field` as the init field of `class`.
    pub fn map(&self, class: TypeId, field: FieldId) {
        self.fields.insert(class, field);
    }

    /// Finishes the lens.
    #[must_use]
    pub fn build(self) -> InitClassLens {
        InitClassLens {
            fields: self.fields.into_iter().collect(),
        }
    }
}
