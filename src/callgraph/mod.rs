//! Inter-procedural call graph and bottom-up scheduling.
//!
//! The call graph has one node per program method and an edge from every
//! method to each program method it may invoke. Library code is not modeled.
//! Virtual and interface invocations are resolved conservatively: besides the
//! resolved target, every override a subtype could dispatch to becomes a
//! callee as well.
//!
//! The graph drives processing order. [`CallGraph::pick_leaves`] hands out
//! the methods that no longer call anything that is still in the graph and
//! removes them, so callees are always handed out before their callers.
//! Remaining cycles are broken deterministically when no leaf is left.
//!
//! # Components
//!
//! - [`CallGraph`]: Nodes, edges and call-site classification
//! - [`CallGraphNode`]: Per-method invoke count, recursion flag and edges
//! - [`CallGraphBuilder`]: Parallel invoke scanning with serial edge insertion
//! - [`Leaves`]: The outcome of one scheduling step
//!
//! # Example
//!
//! ```rust
//! use shrinkwave::callgraph::CallGraph;
//! use shrinkwave::ir::{CodeBuilder, InvokeKind};
//! use shrinkwave::program::{IdentityLens, MethodFlags, ProgramBuilder};
//!
//! let mut builder = ProgramBuilder::new();
//! let app = builder.class("LApp;");
//! let main = builder.method(app, "main", "()V", MethodFlags::STATIC);
//! let helper = builder.method(app, "helper", "()V", MethodFlags::STATIC);
//! let mut code = CodeBuilder::new(main);
//! code.invoke(InvokeKind::Static, builder.method_ref(helper), &[]);
//! code.return_void();
//! builder.body(main, code.finish()?);
//! let program = builder.build();
//!
//! let mut graph = CallGraph::build(&program, &IdentityLens)?;
//! let mut order = Vec::new();
//! while let Some(leaves) = graph.pick_leaves()? {
//!     order.extend(leaves.iter());
//! }
//! assert_eq!(order, vec![helper, main]);
//! # Ok::<(), shrinkwave::Error>(())
//! ```

mod builder;
mod graph;
mod leaves;
mod node;

pub use builder::CallGraphBuilder;
pub use graph::{CallGraph, CallGraphStats};
pub use leaves::{CycleBreakingCalls, Leaves};
pub use node::CallGraphNode;
