use thiserror::Error;

use crate::program::MethodId;

/// Builds an [`Error::Invariant`] carrying the source location of the failed check.
macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant describes an internal consistency failure of the optimizer. None of them
/// are caused by the analysed program itself: unresolvable invocations or field references
/// are handled conservatively and never surface as errors. Callers are expected to abort the
/// current compilation when any of these is returned.
///
/// # Error Categories
///
/// ## Invariant Violations
/// - [`Error::Invariant`] - A checked internal invariant did not hold
/// - [`Error::MissingNode`] - A program method has no call graph node
/// - [`Error::AlreadyProcessed`] - The scheduler produced a method that was already processed
/// - [`Error::NoLeaves`] - A scheduling step on a non-empty graph produced nothing
/// - [`Error::InconsistentCode`] - A method body failed verification after a pass
///
/// ## Runtime Errors
/// - [`Error::ThreadPool`] - The worker pool could not be created
///
/// # Examples
///
/// ```rust
/// use shrinkwave::Error;
///
/// fn report(result: shrinkwave::Result<()>) {
///     match result {
///         Ok(()) => {}
///         Err(Error::Invariant { message, file, line }) => {
///             eprintln!("internal error: {message} ({file}:{line})");
///         }
///         Err(e) => eprintln!("internal error: {e}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An internal invariant of the optimizer did not hold.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// The message describing the violation
        message: String,
        /// The source file in which the violation was detected
        file: &'static str,
        /// The source line in which the violation was detected
        line: u32,
    },

    /// A program method is not represented in the call graph.
    #[error("Method {0} is missing from the call graph")]
    MissingNode(MethodId),

    /// The leaf scheduler returned a method that was already marked as processed.
    #[error("Method {0} was scheduled after it had already been processed")]
    AlreadyProcessed(MethodId),

    /// A scheduling step on a non-empty call graph did not produce any leaves.
    #[error("No leaves could be extracted from a call graph with {0} nodes")]
    NoLeaves(usize),

    /// A method body is no longer well formed.
    #[error("Inconsistent code in method {method}: {message}")]
    InconsistentCode {
        /// The method whose body failed verification
        method: MethodId,
        /// What the verifier found
        message: String,
    },

    /// The worker pool could not be created.
    #[error("Failed to create worker pool - {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
