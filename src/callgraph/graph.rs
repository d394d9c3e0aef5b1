//! Call graph representation.
//!
//! Nodes live in an arena indexed by insertion order. Removing a node leaves
//! an empty slot behind so indices stay stable while the scheduler peels the
//! graph apart. All edge mutation goes through methods of [`CallGraph`] that
//! update both endpoints.

use std::{fmt::Write, sync::Arc};

use dashmap::DashSet;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    callgraph::{builder::CallGraphBuilder, CallGraphNode},
    program::{GraphLens, MethodId, Program},
    utils::escape_dot,
    Error, Result,
};

/// Inter-procedural call graph over the program methods.
///
/// Only program methods are represented. Virtual and interface invocations
/// contribute an edge to every possible dispatch target. The graph is
/// consumed by [`CallGraph::pick_leaves`], which removes methods bottom-up
/// so that callees are handed out before their callers.
///
/// # Example
///
/// ```rust
/// use shrinkwave::callgraph::CallGraph;
/// use shrinkwave::program::{IdentityLens, ProgramBuilder};
///
/// let program = ProgramBuilder::new().build();
/// let mut graph = CallGraph::build(&program, &IdentityLens)?;
/// assert!(graph.is_empty());
/// assert!(graph.pick_leaves()?.is_none());
/// # Ok::<(), shrinkwave::Error>(())
/// ```
#[derive(Debug)]
pub struct CallGraph {
    pub(crate) nodes: Vec<Option<CallGraphNode>>,
    pub(crate) index: FxHashMap<MethodId, usize>,
    pub(crate) live: usize,
    pub(crate) leaves: Vec<usize>,
    single_call_site: FxHashSet<MethodId>,
    double_call_site: FxHashSet<MethodId>,
    pub(crate) processed: Arc<DashSet<MethodId>>,
}

impl CallGraph {
    /// Creates an empty graph that checks scheduled methods against `processed`.
    pub(crate) fn with_processed(processed: Arc<DashSet<MethodId>>) -> Self {
        Self {
            nodes: Vec::new(),
            index: FxHashMap::default(),
            live: 0,
            leaves: Vec::new(),
            single_call_site: FxHashSet::default(),
            double_call_site: FxHashSet::default(),
            processed,
        }
    }

    /// Builds the call graph of `program`, remapping invoked references
    /// through `lens`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingNode`] if a program method ends up without a node.
    pub fn build(program: &Program, lens: &dyn GraphLens) -> Result<Self> {
        CallGraphBuilder::new(program, lens).build()
    }

    /// Returns the arena index of `method`, creating its node if needed.
    pub(crate) fn ensure_node(&mut self, method: MethodId, is_bridge: bool) -> usize {
        if let Some(&index) = self.index.get(&method) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(Some(CallGraphNode::new(method, is_bridge)));
        self.index.insert(method, index);
        self.live += 1;
        index
    }

    /// Records one call site of `caller` targeting `callee`.
    ///
    /// The invoke count of the callee grows with every call site. The edge
    /// itself is added once per pair; a self-call only marks the node as
    /// self-recursive.
    pub(crate) fn add_call(&mut self, caller: usize, callee: usize) {
        if caller == callee {
            if let Some(node) = self.slot_mut(caller) {
                node.self_recursive = true;
            }
        } else {
            if let Some(node) = self.slot_mut(caller) {
                node.callees.insert(callee);
            }
            if let Some(node) = self.slot_mut(callee) {
                node.callers.insert(caller);
            }
        }
        if let Some(node) = self.slot_mut(callee) {
            node.invoke_count += 1;
        }
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&CallGraphNode> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut CallGraphNode> {
        self.nodes.get_mut(index).and_then(Option::as_mut)
    }

    /// Classifies methods by their number of call sites.
    ///
    /// Only runs with closed-world information. Pinned methods can be called
    /// from outside the program and are never classified.
    pub(crate) fn fill_call_site_sets(&mut self, program: &Program) {
        let Some(liveness) = program.liveness() else {
            return;
        };
        for node in self.nodes.iter().flatten() {
            if liveness.is_pinned(node.method) {
                continue;
            }
            match node.invoke_count {
                1 => {
                    self.single_call_site.insert(node.method);
                }
                2 => {
                    self.double_call_site.insert(node.method);
                }
                _ => {}
            }
        }
    }

    /// Seeds the leaf frontier with every node without outgoing calls.
    pub(crate) fn fill_initial_leaves(&mut self) {
        self.leaves = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|node| node.is_leaf())
                    .map(|_| index)
            })
            .collect();
    }

    /// Checks that every program method has a node.
    pub(crate) fn check_all_methods_exist(&self, program: &Program) -> Result<()> {
        match program
            .program_methods()
            .into_iter()
            .find(|method| !self.index.contains_key(method))
        {
            Some(missing) => Err(Error::MissingNode(missing)),
            None => Ok(()),
        }
    }

    /// Returns `true` if `method` is known to be invoked from exactly one call site.
    ///
    /// Always `false` for pinned methods and when no closed-world information
    /// was available while building.
    #[must_use]
    pub fn has_single_call_site(&self, method: MethodId) -> bool {
        self.single_call_site.contains(&method)
    }

    /// Returns `true` if `method` is known to be invoked from exactly two call sites.
    #[must_use]
    pub fn has_double_call_site(&self, method: MethodId) -> bool {
        self.double_call_site.contains(&method)
    }

    /// Returns `true` once every node has been handed out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of nodes still in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if `method` still has a node.
    #[must_use]
    pub fn contains(&self, method: MethodId) -> bool {
        self.node(method).is_some()
    }

    /// Returns the node of `method`, if it is still in the graph.
    #[must_use]
    pub fn node(&self, method: MethodId) -> Option<&CallGraphNode> {
        self.index.get(&method).and_then(|&index| self.slot(index))
    }

    /// Iterates over the remaining nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &CallGraphNode> {
        self.nodes.iter().flatten()
    }

    fn methods_of<'a>(&'a self, indices: impl Iterator<Item = &'a usize>) -> Vec<MethodId> {
        indices
            .filter_map(|&index| self.slot(index).map(CallGraphNode::method))
            .collect()
    }

    /// Methods `method` still calls, in the order the calls were found.
    #[must_use]
    pub fn callees(&self, method: MethodId) -> Vec<MethodId> {
        self.node(method)
            .map(|node| self.methods_of(node.callees.iter()))
            .unwrap_or_default()
    }

    /// Methods still calling `method`, in the order the calls were found.
    #[must_use]
    pub fn callers(&self, method: MethodId) -> Vec<MethodId> {
        self.node(method)
            .map(|node| self.methods_of(node.callers.iter()))
            .unwrap_or_default()
    }

    /// Number of edges between distinct methods.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes().map(CallGraphNode::call_degree).sum()
    }

    /// Verifies that every callee edge has a matching caller edge and the
    /// other way round, and that no edge points at a removed node.
    ///
    /// # Errors
    ///
    /// Returns an invariant error naming the first asymmetric edge.
    pub fn verify_symmetry(&self) -> Result<()> {
        for (index, node) in self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|node| (index, node)))
        {
            if node.callees.contains(&index) || node.callers.contains(&index) {
                return Err(invariant_error!("{} has an edge to itself", node.method));
            }
            for &callee in &node.callees {
                let Some(target) = self.slot(callee) else {
                    return Err(invariant_error!(
                        "{} calls a removed node {}",
                        node.method,
                        callee
                    ));
                };
                if !target.callers.contains(&index) {
                    return Err(invariant_error!(
                        "{} calls {} but is not among its callers",
                        node.method,
                        target.method
                    ));
                }
            }
            for &caller in &node.callers {
                let Some(source) = self.slot(caller) else {
                    return Err(invariant_error!(
                        "{} is called by a removed node {}",
                        node.method,
                        caller
                    ));
                };
                if !source.callees.contains(&index) {
                    return Err(invariant_error!(
                        "{} lists {} as caller but is not among its callees",
                        node.method,
                        source.method
                    ));
                }
            }
        }
        Ok(())
    }

    /// Computes aggregate metrics about the remaining graph.
    #[must_use]
    pub fn stats(&self) -> CallGraphStats {
        let mut stats = CallGraphStats {
            single_call_sites: self.single_call_site.len(),
            double_call_sites: self.double_call_site.len(),
            ..CallGraphStats::default()
        };
        for node in self.nodes() {
            stats.method_count += 1;
            stats.edge_count += node.call_degree();
            stats.total_invokes += node.invoke_count;
            if node.self_recursive {
                stats.self_recursive += 1;
            }
            if node.is_bridge {
                stats.bridge_methods += 1;
            }
            if node.is_leaf() {
                stats.leaf_methods += 1;
            }
        }
        stats
    }

    /// Generates a DOT representation of the remaining graph.
    ///
    /// Leaves are filled blue, self-recursive methods orange and bridges grey.
    ///
    /// # Arguments
    ///
    /// * `program` - Used to label nodes with method names
    /// * `title` - Optional graph title
    #[must_use]
    pub fn to_dot(&self, program: &Program, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CallGraph {\n");
        let _ = writeln!(
            dot,
            "    label=\"{}\";",
            escape_dot(title.unwrap_or("Call Graph"))
        );
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    rankdir=BT;\n\n");

        for node in self.nodes() {
            let style = if node.is_bridge {
                ", style=filled, fillcolor=lightgrey"
            } else if node.self_recursive {
                ", style=filled, fillcolor=orange"
            } else if node.is_leaf() {
                ", style=filled, fillcolor=lightblue"
            } else {
                ""
            };
            let _ = writeln!(
                dot,
                "    \"{}\" [label=\"{}\"{style}];",
                node.method,
                escape_dot(&program.method_label(node.method)),
            );
        }

        dot.push('\n');

        for node in self.nodes() {
            for callee in self.methods_of(node.callees.iter()) {
                let _ = writeln!(dot, "    \"{}\" -> \"{callee}\";", node.method);
            }
        }

        dot.push_str("}\n");
        dot
    }
}

/// Statistics about a call graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraphStats {
    /// Number of methods (nodes) in the graph.
    pub method_count: usize,
    /// Number of call edges between distinct methods.
    pub edge_count: usize,
    /// Sum of the invoke counts of all nodes.
    pub total_invokes: usize,
    /// Number of methods calling themselves.
    pub self_recursive: usize,
    /// Number of bridge methods.
    pub bridge_methods: usize,
    /// Number of methods without outgoing calls.
    pub leaf_methods: usize,
    /// Number of methods with exactly one call site.
    pub single_call_sites: usize,
    /// Number of methods with exactly two call sites.
    pub double_call_sites: usize,
}

impl CallGraphStats {
    /// Average number of distinct callees per method.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_degree(&self) -> f64 {
        if self.method_count == 0 {
            0.0
        } else {
            self.edge_count as f64 / self.method_count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(index: u32) -> MethodId {
        MethodId::new(index)
    }

    fn graph() -> CallGraph {
        CallGraph::with_processed(Arc::new(DashSet::new()))
    }

    #[test]
    fn test_duplicate_calls_share_one_edge() {
        let mut graph = graph();
        let a = graph.ensure_node(m(0), false);
        let b = graph.ensure_node(m(1), false);
        graph.add_call(a, b);
        graph.add_call(a, b);
        graph.add_call(a, b);

        assert_eq!(graph.callees(m(0)), vec![m(1)]);
        assert_eq!(graph.callers(m(1)), vec![m(0)]);
        assert_eq!(graph.node(m(1)).unwrap().invoke_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        graph.verify_symmetry().unwrap();
    }

    #[test]
    fn test_self_call_sets_flag_only() {
        let mut graph = graph();
        let a = graph.ensure_node(m(7), false);
        graph.add_call(a, a);

        let node = graph.node(m(7)).unwrap();
        assert!(node.is_self_recursive());
        assert!(node.is_leaf());
        assert_eq!(node.caller_count(), 0);
        assert_eq!(node.invoke_count(), 1);
        graph.verify_symmetry().unwrap();
    }

    #[test]
    fn test_ensure_node_is_idempotent() {
        let mut graph = graph();
        let first = graph.ensure_node(m(2), true);
        let second = graph.ensure_node(m(2), false);
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
        assert!(graph.node(m(2)).unwrap().is_bridge());
    }

    #[test]
    fn test_symmetry_violation_detected() {
        let mut graph = graph();
        let a = graph.ensure_node(m(0), false);
        let b = graph.ensure_node(m(1), false);
        graph.add_call(a, b);
        graph.slot_mut(b).unwrap().callers.clear();

        assert!(matches!(
            graph.verify_symmetry(),
            Err(Error::Invariant { .. })
        ));
    }

    #[test]
    fn test_stats() {
        let mut graph = graph();
        let a = graph.ensure_node(m(0), false);
        let b = graph.ensure_node(m(1), true);
        let c = graph.ensure_node(m(2), false);
        graph.add_call(a, b);
        graph.add_call(a, c);
        graph.add_call(c, c);

        let stats = graph.stats();
        assert_eq!(stats.method_count, 3);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.total_invokes, 3);
        assert_eq!(stats.self_recursive, 1);
        assert_eq!(stats.bridge_methods, 1);
        assert_eq!(stats.leaf_methods, 2);
        assert!((stats.average_degree() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_empty_graph() {
        assert!((CallGraphStats::default().average_degree()).abs() < f64::EPSILON);
    }
}
