//! Minimal graph infrastructure shared by the control-flow analyses.
//!
//! Graphs are plain index-based adjacency structures. Algorithms are written
//! against the traits in [`traits`] so that method bodies can expose their
//! block graph without copying it into a separate container.

pub mod algorithms;
mod node;
mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
