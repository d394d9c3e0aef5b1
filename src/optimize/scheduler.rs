//! Bottom-up wave scheduler.
//!
//! The `PassScheduler` repeatedly extracts the current leaves of the call
//! graph and runs every registered pass on the methods of that wave in
//! parallel. A method is processed only after every method it calls, except
//! for calls severed to break a cycle.

use std::fmt;

use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};

use crate::{
    callgraph::CallGraphBuilder,
    events::{EventKind, EventLog},
    ir::MethodCode,
    optimize::{
        MethodPass, NoNarrowing, PassContext, RedundantFieldLoadElimination, TypeNarrowing,
    },
    program::{GraphLens, InitClassLens, InitClassLensBuilder, MethodId, Program},
    shaking::ClassInitFieldSynthesizer,
    OptimizerConfig, Result,
};

/// Summary of one scheduler run.
#[derive(Debug, Default, Clone)]
pub struct OptimizationReport {
    /// Number of waves taken from the call graph.
    pub waves: usize,
    /// Number of methods handed to the passes.
    pub methods_processed: usize,
    /// Number of methods at least one pass changed.
    pub changed_methods: usize,
    /// Number of waves that needed calls severed first.
    pub cycle_broken_waves: usize,
    /// Total number of severed calls.
    pub severed_calls: usize,
    /// Everything recorded during the run.
    pub events: EventLog,
}

impl OptimizationReport {
    /// Returns `true` if any method changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changed_methods > 0
    }
}

impl fmt::Display for OptimizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} waves, {} methods processed, {} changed",
            self.waves, self.methods_processed, self.changed_methods
        )?;
        if self.cycle_broken_waves > 0 {
            write!(
                f,
                ", {} calls severed in {} waves",
                self.severed_calls, self.cycle_broken_waves
            )?;
        }
        Ok(())
    }
}

/// Runs method passes over a program, callees before callers.
///
/// # Example
///
/// ```rust
/// use shrinkwave::optimize::PassScheduler;
/// use shrinkwave::program::{IdentityLens, ProgramBuilder};
/// use shrinkwave::OptimizerConfig;
///
/// let program = ProgramBuilder::new().build();
/// let scheduler = PassScheduler::with_default_passes(OptimizerConfig::default());
/// let report = scheduler.run(&program, &IdentityLens)?;
/// assert_eq!(report.waves, 0);
/// # Ok::<(), shrinkwave::Error>(())
/// ```
pub struct PassScheduler {
    config: OptimizerConfig,
    passes: Vec<Box<dyn MethodPass>>,
    narrowing: Box<dyn TypeNarrowing>,
}

impl PassScheduler {
    /// Creates a scheduler without passes.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
            narrowing: Box::new(NoNarrowing),
        }
    }

    /// Creates a scheduler running the built-in passes.
    #[must_use]
    pub fn with_default_passes(config: OptimizerConfig) -> Self {
        let mut scheduler = Self::new(config);
        scheduler.add_pass(RedundantFieldLoadElimination::new());
        scheduler
    }

    /// Appends a pass. Passes run in registration order on each method.
    pub fn add_pass(&mut self, pass: impl MethodPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Replaces the step that consumes affected values.
    #[must_use]
    pub fn with_narrowing(mut self, narrowing: impl TypeNarrowing + 'static) -> Self {
        self.narrowing = Box::new(narrowing);
        self
    }

    /// The options this scheduler runs with.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Names of the registered passes, in run order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(threads) = self.config.threads {
            builder = builder.num_threads(threads);
        }
        Ok(builder.build()?)
    }

    /// Processes every program method once, wave by wave.
    ///
    /// # Arguments
    ///
    /// * `program` - The program whose bodies are rewritten in place.
    /// * `lens` - Method mappings applied to invoke targets while building the call graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be created, the call graph
    /// is inconsistent, or a pass fails. Bodies taken out for processing are
    /// put back before the error is returned.
    pub fn run(&self, program: &Program, lens: &dyn GraphLens) -> Result<OptimizationReport> {
        let pool = self.build_pool()?;
        pool.install(|| self.run_in_current_pool(program, lens))
    }

    /// Runs the waves, then maps every class-initialization check to a
    /// static field.
    ///
    /// # Errors
    ///
    /// See [`PassScheduler::run`] and [`ClassInitFieldSynthesizer::run`].
    pub fn optimize(
        &self,
        program: &mut Program,
        lens: &dyn GraphLens,
    ) -> Result<(OptimizationReport, InitClassLens)> {
        let pool = self.build_pool()?;
        let report = pool.install(|| self.run_in_current_pool(program, lens))?;
        let init_classes = if self.config.enable_class_init_field_synthesis {
            ClassInitFieldSynthesizer::new(&pool).run(program, &report.events)?
        } else {
            InitClassLensBuilder::new().build()
        };
        Ok((report, init_classes))
    }

    fn run_in_current_pool(
        &self,
        program: &Program,
        lens: &dyn GraphLens,
    ) -> Result<OptimizationReport> {
        let mut report = OptimizationReport::default();
        let mut graph = CallGraphBuilder::new(program, lens)
            .with_parallel_scan(self.config.parallel_call_graph_scan)
            .with_events(&report.events)
            .build()?;

        while let Some(leaves) = graph.pick_leaves()? {
            report.waves += 1;
            report
                .events
                .record(EventKind::LeavesPicked)
                .message(format!("wave {}: {}", report.waves, leaves));
            if leaves.has_broke_cycles() {
                report.cycle_broken_waves += 1;
                for (&caller, callees) in leaves.cycle_breaking_calls() {
                    report.severed_calls += callees.len();
                    report
                        .events
                        .record(EventKind::CyclesBroken)
                        .method(caller)
                        .message(format!("{} severed calls", callees.len()));
                }
            }

            let changed: Vec<bool> = {
                let ctx = PassContext::new(program, &self.config, &report.events)
                    .with_call_graph(&graph);
                leaves
                    .methods()
                    .par_iter()
                    .map(|&method| self.process_method(method, &ctx))
                    .collect::<Result<_>>()?
            };
            report.methods_processed += changed.len();
            report.changed_methods += changed.iter().filter(|&&c| c).count();
        }

        Ok(report)
    }

    /// Runs all passes on one method and returns whether any of them changed it.
    fn process_method(&self, method: MethodId, ctx: &PassContext<'_>) -> Result<bool> {
        let Some(mut code) = ctx.program.take_code(method) else {
            ctx.program.mark_processed(method);
            return Ok(false);
        };

        let result = self.run_passes(&mut code, ctx);
        ctx.program.put_code(method, code);
        let changed = result?;

        ctx.program.mark_processed(method);
        ctx.events
            .record(EventKind::MethodProcessed)
            .method(method)
            .message(if changed { "changed" } else { "unchanged" });
        Ok(changed)
    }

    fn run_passes(&self, code: &mut MethodCode, ctx: &PassContext<'_>) -> Result<bool> {
        let mut changed = false;
        let mut affected = Vec::new();
        for pass in &self.passes {
            if !pass.should_run(code, ctx) {
                continue;
            }
            let outcome = pass.run_on_method(code, ctx)?;
            if !outcome.changed {
                continue;
            }
            if self.config.verify_code {
                code.check_consistency()?;
            }
            changed = true;
            affected.extend(outcome.affected_values);
        }

        if !affected.is_empty() {
            affected.sort_unstable();
            affected.dedup();
            self.narrowing.narrow(ctx.program, code, &affected)?;
        }
        Ok(changed)
    }
}
