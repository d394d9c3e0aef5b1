//! Bottom-up leaf extraction and cycle breaking.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::{callgraph::CallGraph, program::MethodId, Error, Result};

/// Severed callees per cycle-broken method, in the order the methods were broken.
pub type CycleBreakingCalls = IndexMap<MethodId, Vec<MethodId>, FxBuildHasher>;

/// The methods removed from a [`CallGraph`] by one scheduling step.
#[derive(Debug, Clone)]
pub struct Leaves {
    leaves: Vec<MethodId>,
    broke_cycles: bool,
    cycle_breaking_calls: CycleBreakingCalls,
}

impl Leaves {
    /// Number of methods in this step. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Always `false`; a step that would produce nothing is an error instead.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// The removed methods, in removal order.
    #[must_use]
    pub fn methods(&self) -> &[MethodId] {
        &self.leaves
    }

    /// Iterates over the removed methods.
    pub fn iter(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.leaves.iter().copied()
    }

    /// Returns `true` if calls had to be severed to produce this step.
    #[must_use]
    pub fn has_broke_cycles(&self) -> bool {
        self.broke_cycles
    }

    /// For every method whose outgoing calls were severed, the callees it lost.
    ///
    /// The severed callees are not necessarily part of this step.
    #[must_use]
    pub fn cycle_breaking_calls(&self) -> &CycleBreakingCalls {
        &self.cycle_breaking_calls
    }

    /// Total number of severed calls.
    #[must_use]
    pub fn severed_call_count(&self) -> usize {
        self.cycle_breaking_calls.values().map(Vec::len).sum()
    }
}

impl fmt::Display for Leaves {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Leaves: {}, {}",
            self.leaves.len(),
            if self.broke_cycles {
                "call cycles broken"
            } else {
                "no call cycles broken"
            }
        )
    }
}

impl CallGraph {
    /// Removes and returns the next set of leaves.
    ///
    /// Leaves are the methods without remaining outgoing calls. When the
    /// remaining graph is entirely cyclic, calls are severed first (see
    /// [`CallGraph::break_cycles`]) so that the step never comes back empty.
    /// Returns `Ok(None)` once the graph is empty.
    ///
    /// # Errors
    ///
    /// - [`Error::NoLeaves`] if no leaf could be produced from a non-empty graph
    /// - [`Error::AlreadyProcessed`] if a returned method was already processed
    /// - [`Error::Invariant`] if the leaf frontier is out of sync with the graph
    pub fn pick_leaves(&mut self) -> Result<Option<Leaves>> {
        if self.is_empty() {
            return Ok(None);
        }

        let mut broke_cycles = false;
        let mut cycle_breaking_calls = CycleBreakingCalls::default();
        let mut leaves = self.remove_leaves()?;
        if leaves.is_empty() {
            cycle_breaking_calls = self.break_cycles();
            broke_cycles = true;
            leaves = self.remove_leaves()?;
        }

        if leaves.is_empty() {
            return Err(Error::NoLeaves(self.len()));
        }
        if let Some(&processed) = leaves.iter().find(|m| self.processed.contains(*m)) {
            return Err(Error::AlreadyProcessed(processed));
        }

        Ok(Some(Leaves {
            leaves,
            broke_cycles,
            cycle_breaking_calls,
        }))
    }

    /// Removes every node of the current frontier. Callers left without
    /// outgoing calls form the next frontier.
    fn remove_leaves(&mut self) -> Result<Vec<MethodId>> {
        let frontier = std::mem::take(&mut self.leaves);
        let mut next = Vec::new();
        let mut removed = Vec::with_capacity(frontier.len());

        for index in frontier {
            let Some(node) = self.nodes.get_mut(index).and_then(Option::take) else {
                return Err(invariant_error!("leaf {} is no longer in the call graph", index));
            };
            if !node.is_leaf() {
                return Err(invariant_error!(
                    "leaf {} still calls {} methods",
                    node.method,
                    node.call_degree()
                ));
            }
            for &caller in &node.callers {
                if let Some(caller_node) = self.slot_mut(caller) {
                    caller_node.callees.shift_remove(&index);
                    if caller_node.is_leaf() {
                        next.push(caller);
                    }
                }
            }
            self.index.remove(&node.method);
            self.live -= 1;
            removed.push(node.method);
        }

        self.leaves = next;
        Ok(removed)
    }

    /// Severs calls to turn some nodes of a fully cyclic graph into leaves.
    ///
    /// Nodes are visited in insertion order. The first phase clears the
    /// outgoing calls of every non-bridge node calling at most one method. If
    /// that phase produced nothing, the second phase clears the outgoing calls
    /// of every node at the minimum remaining call degree, bridges included.
    /// Returns the severed callees per cleared node.
    pub(crate) fn break_cycles(&mut self) -> CycleBreakingCalls {
        let mut broken = CycleBreakingCalls::default();

        let mut min_degree = self.len();
        for index in 0..self.nodes.len() {
            let Some(node) = self.slot(index) else {
                continue;
            };
            if !node.is_bridge() && node.call_degree() <= 1 {
                let method = node.method;
                let severed = self.remove_all_calls(index);
                broken.insert(method, severed);
                self.leaves.push(index);
            } else {
                min_degree = min_degree.min(node.call_degree());
            }
        }
        if !self.leaves.is_empty() {
            return broken;
        }

        for index in 0..self.nodes.len() {
            let Some(node) = self.slot(index) else {
                continue;
            };
            if node.call_degree() <= min_degree {
                let method = node.method;
                let severed = self.remove_all_calls(index);
                broken.insert(method, severed);
                self.leaves.push(index);
            }
        }
        broken
    }

    /// Clears the outgoing calls of a node, returning the former callees.
    fn remove_all_calls(&mut self, index: usize) -> Vec<MethodId> {
        let callees = match self.slot_mut(index) {
            Some(node) => std::mem::take(&mut node.callees),
            None => return Vec::new(),
        };
        let mut severed = Vec::with_capacity(callees.len());
        for callee in callees {
            if let Some(target) = self.slot_mut(callee) {
                target.callers.shift_remove(&index);
                severed.push(target.method);
            }
        }
        severed
    }
}
