// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # shrinkwave
//!
//! Whole-program optimizer core for class-file style bytecode in SSA form.
//!
//! `shrinkwave` orders the methods of a closed program bottom-up over its call
//! graph and runs per-method passes on each wave in parallel. It ships with
//! one pass, redundant field-load elimination, which replaces field reads and
//! class-initialization checks whose outcome is already known.
//!
//! ## Features
//!
//! - **Call graph** - Per-method edges with conservative virtual dispatch,
//!   plus single- and double-call-site classification
//! - **Wave scheduling** - Callees before callers, with deterministic cycle
//!   breaking when only cycles remain
//! - **Field-load elimination** - Dominator-tree walk over persistent field
//!   value maps, aware of aliasing, finality, volatility and class
//!   initialization side effects
//! - **Init-class fields** - Existing or synthesized static fields standing in
//!   for class-initialization checks
//!
//! ## Quick Start
//!
//! ```rust
//! use shrinkwave::prelude::*;
//!
//! let mut builder = ProgramBuilder::new();
//! let app = builder.class("Lp/App;");
//! let count = builder.field(app, "count", "I", FieldFlags::empty());
//! let run = builder.method(app, "run", "(Lp/App;)I", MethodFlags::PUBLIC);
//!
//! let mut code = CodeBuilder::new(run);
//! let this = code.argument(0);
//! let first = code.instance_get(this, builder.field_ref(count));
//! let second = code.instance_get(this, builder.field_ref(count));
//! let sum = code.add(first, second);
//! code.return_value(sum);
//! builder.body(run, code.finish()?);
//! let program = builder.build();
//!
//! let report = PassScheduler::with_default_passes(OptimizerConfig::default())
//!     .run(&program, &IdentityLens)?;
//! assert_eq!(report.events.count_kind(EventKind::FieldLoadEliminated), 1);
//! # Ok::<(), shrinkwave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`program`] - Classes, members, bodies and resolution queries
//! - [`ir`] - SSA method bodies
//! - [`callgraph`] - Call graph construction and leaf extraction
//! - [`optimize`] - Passes and the wave scheduler
//! - [`shaking`] - Program-level rewrites after optimization
//! - [`events`] - Lock-free log of scheduling decisions and rewrites
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Errors describe internal
//! inconsistencies only; unresolvable references in the analysed program are
//! handled conservatively and never fail.
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use shrinkwave::prelude::*;
///
/// let config = OptimizerConfig::default().with_threads(2);
/// let scheduler = PassScheduler::with_default_passes(config);
/// assert_eq!(scheduler.pass_names().len(), 1);
/// ```
pub mod prelude;

pub mod callgraph;
pub mod config;
pub mod events;
pub mod ir;
pub mod optimize;
pub mod program;
pub mod shaking;
pub mod utils;

/// `shrinkwave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `shrinkwave` Error type
///
/// The error type for all operations in this crate. Every variant describes an internal
/// consistency failure of the optimizer.
pub use error::Error;

/// Optimizer options shared by the scheduler and its passes.
pub use config::OptimizerConfig;
