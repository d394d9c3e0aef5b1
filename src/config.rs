//! Optimizer configuration.

/// Options controlling call-graph construction, scheduling and the per-method passes.
///
/// # Example
///
/// ```rust
/// use shrinkwave::OptimizerConfig;
///
/// let config = OptimizerConfig::default()
///     .with_threads(4)
///     .with_whole_program_optimizations(false);
/// assert_eq!(config.threads, Some(4));
/// assert!(config.enable_redundant_field_load_elimination);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerConfig {
    /// Run the redundant field-load and class-initialization elimination pass.
    ///
    /// Default: `true`
    pub enable_redundant_field_load_elimination: bool,

    /// Allow facts that need a closed world.
    ///
    /// When disabled, field references only resolve against the holder of the
    /// method being optimized, and constructor field summaries are ignored.
    ///
    /// Default: `true`
    pub enable_whole_program_optimizations: bool,

    /// Replace class-initialization checks by reads of a (possibly synthesized)
    /// static field.
    ///
    /// Default: `true`
    pub enable_class_init_field_synthesis: bool,

    /// Extract invocation targets of all methods in parallel while building
    /// the call graph.
    ///
    /// Default: `true`
    pub parallel_call_graph_scan: bool,

    /// Worker count for the pool the scheduler creates. `None` uses rayon's
    /// default.
    ///
    /// Default: `None`
    pub threads: Option<usize>,

    /// Verify every method body after a pass changed it.
    ///
    /// Default: `true`
    pub verify_code: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enable_redundant_field_load_elimination: true,
            enable_whole_program_optimizations: true,
            enable_class_init_field_synthesis: true,
            parallel_call_graph_scan: true,
            threads: None,
            verify_code: true,
        }
    }
}

impl OptimizerConfig {
    /// Enables or disables redundant field-load elimination.
    #[must_use]
    pub fn with_redundant_field_load_elimination(mut self, enabled: bool) -> Self {
        self.enable_redundant_field_load_elimination = enabled;
        self
    }

    /// Enables or disables closed-world assumptions.
    #[must_use]
    pub fn with_whole_program_optimizations(mut self, enabled: bool) -> Self {
        self.enable_whole_program_optimizations = enabled;
        self
    }

    /// Enables or disables class-init field synthesis.
    #[must_use]
    pub fn with_class_init_field_synthesis(mut self, enabled: bool) -> Self {
        self.enable_class_init_field_synthesis = enabled;
        self
    }

    /// Enables or disables the parallel call graph scan.
    #[must_use]
    pub fn with_parallel_call_graph_scan(mut self, enabled: bool) -> Self {
        self.parallel_call_graph_scan = enabled;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Enables or disables verification after each changing pass.
    #[must_use]
    pub fn with_verification(mut self, enabled: bool) -> Self {
        self.verify_code = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OptimizerConfig::default();
        assert!(config.enable_redundant_field_load_elimination);
        assert!(config.enable_whole_program_optimizations);
        assert!(config.parallel_call_graph_scan);
        assert!(config.verify_code);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_builders() {
        let config = OptimizerConfig::default()
            .with_redundant_field_load_elimination(false)
            .with_class_init_field_synthesis(false)
            .with_parallel_call_graph_scan(false)
            .with_verification(false)
            .with_threads(2);
        assert!(!config.enable_redundant_field_load_elimination);
        assert!(!config.enable_class_init_field_synthesis);
        assert!(!config.parallel_call_graph_scan);
        assert!(!config.verify_code);
        assert_eq!(config.threads, Some(2));
    }
}
