//! Per-method optimization passes and the wavefront driver that runs them.
//!
//! Passes implement [`MethodPass`] and transform one [`MethodCode`] at a time.
//! The [`PassScheduler`] orders methods with the call graph so that every
//! method is optimized after the methods it calls, and runs all methods of
//! one wave in parallel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  PassScheduler                                                   │
//! │    ├─ CallGraph::build          parallel invoke scan             │
//! │    └─ loop pick_leaves()        one wave per frontier            │
//! │         └─ par_iter over wave                                    │
//! │              ├─ Program::take_code                               │
//! │              ├─ MethodPass::run_on_method   (each pass)          │
//! │              ├─ MethodCode::check_consistency                    │
//! │              ├─ TypeNarrowing::narrow       affected values      │
//! │              ├─ Program::put_code                                │
//! │              └─ Program::mark_processed                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Passes
//!
//! - [`RedundantFieldLoadElimination`]: removes field reads and class
//!   initialization checks whose result is already known

mod field_values;
mod redundant_loads;
mod scheduler;

pub use field_values::{FieldValue, FieldValuesMap};
pub use redundant_loads::{FieldLoadStats, RedundantFieldLoadElimination};
pub use scheduler::{OptimizationReport, PassScheduler};

use crate::{
    callgraph::CallGraph,
    events::EventLog,
    ir::{MethodCode, ValueId},
    program::Program,
    OptimizerConfig, Result,
};

/// Shared, read-only state handed to every pass invocation.
///
/// The context is shared between all workers of a wave. Method bodies are
/// not reachable through it while they are being processed: the scheduler
/// takes a body out of the program before handing it to the passes.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    /// The program being optimized.
    pub program: &'a Program,
    /// Optimizer options.
    pub config: &'a OptimizerConfig,
    /// Log receiving rewrite events.
    pub events: &'a EventLog,
    /// The remaining call graph, when running under the scheduler.
    pub call_graph: Option<&'a CallGraph>,
}

impl<'a> PassContext<'a> {
    /// Creates a context without a call graph.
    #[must_use]
    pub fn new(program: &'a Program, config: &'a OptimizerConfig, events: &'a EventLog) -> Self {
        Self {
            program,
            config,
            events,
            call_graph: None,
        }
    }

    /// Attaches the call graph.
    #[must_use]
    pub fn with_call_graph(mut self, call_graph: &'a CallGraph) -> Self {
        self.call_graph = Some(call_graph);
        self
    }
}

/// What a pass did to a method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Whether the body was modified.
    pub changed: bool,
    /// Values whose operands changed and whose type may now be more precise.
    pub affected_values: Vec<ValueId>,
}

impl PassOutcome {
    /// Outcome of a pass that left the body untouched.
    #[must_use]
    pub fn unchanged() -> Self {
        Self::default()
    }
}

/// A transformation that operates on one method body at a time.
///
/// All passes must be thread-safe (Send + Sync): the methods of one wave are
/// processed in parallel and share the pass instance.
pub trait MethodPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific method?
    ///
    /// Called before `run_on_method`. Override to skip bodies that cannot
    /// contain anything the pass is interested in.
    fn should_run(&self, _code: &MethodCode, _ctx: &PassContext<'_>) -> bool {
        true
    }

    /// Run the pass on a single method body.
    ///
    /// Events should be recorded directly to `ctx.events`.
    ///
    /// # Arguments
    ///
    /// * `code` - The body to transform.
    /// * `ctx` - The shared pass context.
    ///
    /// # Errors
    ///
    /// Returns an error if an internal invariant of the pass is violated.
    fn run_on_method(&self, code: &mut MethodCode, ctx: &PassContext<'_>) -> Result<PassOutcome>;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}

/// Consumer of the values a pass marked as affected.
///
/// Replacing a read by an earlier value can give its users a more precise
/// type. The scheduler hands every affected value to the narrowing step
/// before the body goes back into the program.
pub trait TypeNarrowing: Send + Sync {
    /// Re-analyses `affected` in `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is left in an inconsistent state.
    fn narrow(&self, program: &Program, code: &mut MethodCode, affected: &[ValueId]) -> Result<()>;
}

/// Narrowing step that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNarrowing;

impl TypeNarrowing for NoNarrowing {
    fn narrow(&self, _program: &Program, _code: &mut MethodCode, _affected: &[ValueId]) -> Result<()> {
        Ok(())
    }
}
