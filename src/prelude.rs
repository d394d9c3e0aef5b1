//! # shrinkwave Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the shrinkwave library.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all shrinkwave operations
pub use crate::Error;

/// The result type used throughout shrinkwave
pub use crate::Result;

/// Optimizer options
pub use crate::OptimizerConfig;

// ================================================================================================
// Program Model
// ================================================================================================

pub use crate::program::{
    FieldFlags, FieldId, FieldRef, GraphLens, IdentityLens, InitClassLens,
    InstanceInitializerInfo, MethodFlags, MethodId, MethodMappingLens, MethodRef, Program,
    ProgramBuilder, TypeId, Visibility,
};

// ================================================================================================
// Intermediate Representation
// ================================================================================================

pub use crate::ir::{CodeBuilder, InvokeKind, MethodCode, Op, SingleValue, ValueId};

// ================================================================================================
// Call Graph and Scheduling
// ================================================================================================

pub use crate::callgraph::{CallGraph, CallGraphBuilder, Leaves};

pub use crate::optimize::{
    MethodPass, OptimizationReport, PassContext, PassOutcome, PassScheduler,
    RedundantFieldLoadElimination, TypeNarrowing,
};

pub use crate::shaking::ClassInitFieldSynthesizer;

// ================================================================================================
// Events
// ================================================================================================

pub use crate::events::{Event, EventKind, EventLog};
