//! In-memory program model.
//!
//! The optimizer core only needs a narrow view of the program: the methods of
//! the closed program and their bodies, method and field resolution, subtype
//! queries, and a few liveness facts. This module provides that view.
//!
//! # Key Components
//!
//! - [`Program`] - classes, members, bodies and resolution queries
//! - [`ProgramBuilder`] - incremental construction
//! - [`GraphLens`] - method renames and merges applied by earlier transformations
//! - [`InitClassLens`] - class → field used for class-initialization checks
//! - [`InstanceInitializerInfo`] - constructor summaries consumed by callers

mod builder;
mod definitions;
mod flags;
mod ids;
mod lens;
mod model;
mod summary;

pub use builder::ProgramBuilder;
pub use definitions::{ClassDef, FieldDef, MethodDef};
pub use flags::{ClassFlags, ClassKind, FieldFlags, MethodFlags, Visibility};
pub use ids::{FieldId, FieldRef, MethodId, MethodRef, TypeId};
pub use lens::{GraphLens, IdentityLens, InitClassLens, InitClassLensBuilder, MethodMappingLens};
pub use model::{Liveness, Program};
pub use summary::{FieldInitialization, InstanceInitializerInfo};
