//! Traits that let the graph algorithms run over any adjacency representation.
//!
//! - [`GraphBase`] - node count and node iteration
//! - [`Successors`] - outgoing edges
//! - [`Predecessors`] - incoming edges
//! - [`RootedGraph`] - graphs with a designated entry node

use crate::utils::graph::NodeId;

/// Core graph properties.
pub trait GraphBase {
    /// Number of nodes in the graph. Node ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Iterates over every node id.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward edge traversal.
pub trait Successors: GraphBase {
    /// Iterates over the targets of the outgoing edges of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Iterates over the sources of the incoming edges of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a single entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// The entry node.
    fn entry(&self) -> NodeId;
}
