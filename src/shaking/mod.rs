//! Program-level rewrites that run after the per-method passes.
//!
//! # Components
//!
//! - [`ClassInitFieldSynthesizer`]: maps each class referenced by a
//!   class-initialization check to a static field that triggers the same
//!   initialization when read

mod clinit_fields;

pub use clinit_fields::{satisfies_visibility, ClassInitFieldSynthesizer, CLINIT_FIELD_NAME};
