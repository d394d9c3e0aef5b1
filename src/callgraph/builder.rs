//! Call graph construction.
//!
//! Construction runs in two steps. Method bodies are scanned independently,
//! in parallel by default, and each scan yields the resolved targets of every
//! invocation in the body. The scan results are then applied to the graph on
//! the calling thread in program method order, which keeps node insertion
//! order, and with it scheduling, identical across runs.

use rayon::prelude::*;

use crate::{
    callgraph::CallGraph,
    events::{EventKind, EventLog},
    program::{ClassDef, GraphLens, MethodId, Program},
    Result,
};

/// Builds a [`CallGraph`] from a [`Program`].
///
/// # Example
///
/// ```rust
/// use shrinkwave::callgraph::CallGraphBuilder;
/// use shrinkwave::events::EventLog;
/// use shrinkwave::program::{IdentityLens, ProgramBuilder};
///
/// let program = ProgramBuilder::new().build();
/// let events = EventLog::new();
/// let graph = CallGraphBuilder::new(&program, &IdentityLens)
///     .with_parallel_scan(false)
///     .with_events(&events)
///     .build()?;
/// assert!(graph.is_empty());
/// # Ok::<(), shrinkwave::Error>(())
/// ```
pub struct CallGraphBuilder<'a> {
    program: &'a Program,
    lens: &'a dyn GraphLens,
    parallel: bool,
    events: Option<&'a EventLog>,
}

impl<'a> CallGraphBuilder<'a> {
    /// Creates a builder scanning `program` with invoked references remapped
    /// through `lens`.
    #[must_use]
    pub fn new(program: &'a Program, lens: &'a dyn GraphLens) -> Self {
        Self {
            program,
            lens,
            parallel: true,
            events: None,
        }
    }

    /// Selects whether method bodies are scanned on the rayon pool.
    #[must_use]
    pub fn with_parallel_scan(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Records a [`EventKind::CallGraphBuilt`] event into `events`.
    #[must_use]
    pub fn with_events(mut self, events: &'a EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Scans every program method and builds the graph.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingNode`] if a program method is not
    /// represented after construction.
    pub fn build(self) -> Result<CallGraph> {
        let methods = self.program.program_methods();
        let scanned: Vec<(MethodId, Vec<MethodId>)> = if self.parallel {
            methods
                .par_iter()
                .map(|&method| (method, self.invoke_targets(method)))
                .collect()
        } else {
            methods
                .iter()
                .map(|&method| (method, self.invoke_targets(method)))
                .collect()
        };

        let mut graph = CallGraph::with_processed(self.program.processed_methods());
        for (caller, targets) in scanned {
            let caller = graph.ensure_node(caller, self.program.method(caller).is_bridge());
            for target in targets {
                let callee = graph.ensure_node(target, self.program.method(target).is_bridge());
                graph.add_call(caller, callee);
            }
        }

        graph.check_all_methods_exist(self.program)?;
        graph.fill_call_site_sets(self.program);
        graph.fill_initial_leaves();

        if let Some(events) = self.events {
            events.record(EventKind::CallGraphBuilt).message(format!(
                "{} methods, {} calls, {} initial leaves",
                graph.len(),
                graph.edge_count(),
                graph.leaves.len()
            ));
        }
        Ok(graph)
    }

    /// Resolved program targets of every invocation in the body of `method`,
    /// one entry per call site and target.
    fn invoke_targets(&self, method: MethodId) -> Vec<MethodId> {
        let Some(code) = self.program.code(method) else {
            return Vec::new();
        };

        let mut targets = Vec::new();
        for (kind, reference) in code.invokes() {
            let reference = self.lens.lookup_method(reference);
            let Some(definition) = self.program.resolve_method(kind, &reference) else {
                continue;
            };
            if !self.program.is_program_method(definition) {
                continue;
            }
            targets.push(definition);

            if !kind.is_dynamic_dispatch() {
                continue;
            }
            let holder = self.program.method(definition).holder();
            let possible = if self.program.class(holder).is_some_and(ClassDef::is_interface) {
                self.program.lookup_interface_targets(definition)
            } else {
                self.program.lookup_virtual_targets(definition)
            };
            targets.extend(possible.into_iter().filter(|&target| {
                target != definition && self.program.is_program_method(target)
            }));
        }
        targets
    }
}
