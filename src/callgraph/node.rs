//! Call graph node representation.

use std::fmt;

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::program::MethodId;

/// Insertion-ordered set of arena indices.
pub(crate) type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// A program method in the call graph.
///
/// Edges are stored as arena indices in insertion order on both endpoints.
/// An edge between two distinct methods exists at most once no matter how
/// many call sites produce it; calls of a method to itself never create an
/// edge and only set the self-recursion flag.
#[derive(Debug, Clone)]
pub struct CallGraphNode {
    pub(crate) method: MethodId,
    pub(crate) invoke_count: usize,
    pub(crate) self_recursive: bool,
    pub(crate) is_bridge: bool,
    /// Outgoing calls.
    pub(crate) callees: FxIndexSet<usize>,
    /// Incoming calls.
    pub(crate) callers: FxIndexSet<usize>,
}

impl CallGraphNode {
    pub(crate) fn new(method: MethodId, is_bridge: bool) -> Self {
        Self {
            method,
            invoke_count: 0,
            self_recursive: false,
            is_bridge,
            callees: FxIndexSet::default(),
            callers: FxIndexSet::default(),
        }
    }

    /// The method this node stands for.
    #[must_use]
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// Number of resolved call sites targeting this method, across all callers
    /// and including self-calls.
    #[must_use]
    pub fn invoke_count(&self) -> usize {
        self.invoke_count
    }

    /// Returns `true` if the method calls itself.
    #[must_use]
    pub fn is_self_recursive(&self) -> bool {
        self.self_recursive
    }

    /// Returns `true` for bridge methods, which cycle breaking avoids.
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.is_bridge
    }

    /// Number of distinct methods this method still calls.
    #[must_use]
    pub fn call_degree(&self) -> usize {
        self.callees.len()
    }

    /// Number of distinct methods still calling this method.
    #[must_use]
    pub fn caller_count(&self) -> usize {
        self.callers.len()
    }

    /// Returns `true` if the method has no remaining outgoing calls.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.callees.is_empty()
    }
}

impl fmt::Display for CallGraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} callees, {} callers",
            self.method,
            self.callees.len(),
            self.callers.len()
        )?;
        if self.is_bridge {
            f.write_str(", bridge")?;
        }
        if self.self_recursive {
            f.write_str(", recursive")?;
        }
        write!(f, ", invoke count {})", self.invoke_count)
    }
}
