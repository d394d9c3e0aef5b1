//! Dominator trees.
//!
//! A node `d` dominates `n` if every path from the entry to `n` passes through
//! `d`. The tree is computed with the iterative algorithm of Cooper, Harvey and
//! Kennedy over reverse postorder, which is simple and fast for the small,
//! mostly reducible graphs produced by method bodies.

use super::traversal::reverse_postorder_index;
use crate::utils::graph::{NodeId, Predecessors, Successors};

/// Immediate-dominator tree of a rooted graph.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: NodeId,
    /// Immediate dominator per node; the entry maps to itself, unreachable nodes to `None`.
    idom: Vec<Option<NodeId>>,
    /// Children per node, ordered by reverse postorder.
    children: Vec<Vec<NodeId>>,
}

impl DominatorTree {
    /// The root of the tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Number of nodes of the underlying graph, reachable or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.idom.get(node.index()).is_some_and(Option::is_some)
    }

    /// Returns the immediate dominator of `node`, or `None` for the entry and
    /// for unreachable nodes.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry {
            return None;
        }
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` if `a` dominates `b`. Every reachable node dominates itself.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.is_reachable(b) {
            return false;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Children of `node` in the tree, in reverse postorder of the graph.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children
            .get(node.index())
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the reachable nodes in dominator order.
    ///
    /// This is a preorder walk of the tree, so every node comes after all of
    /// its dominators. Siblings are visited in reverse postorder.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.idom.len());
        if !self.is_reachable(self.entry) {
            return order;
        }
        let mut stack = vec![self.entry];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        order
    }
}

/// Computes the dominator tree of `graph` rooted at `entry`.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors + Predecessors,
{
    let node_count = graph.node_count();
    let (rpo, rpo_index) = reverse_postorder_index(graph, entry);

    let mut idom: Vec<Option<NodeId>> = vec![None; node_count];
    if let Some(slot) = idom.get_mut(entry.index()) {
        *slot = Some(entry);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &node in rpo.iter().skip(1) {
            let mut new_idom: Option<NodeId> = None;
            for pred in graph.predecessors(node) {
                if idom.get(pred.index()).copied().flatten().is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, &rpo_index, pred, current),
                });
            }
            if new_idom.is_some() && idom[node.index()] != new_idom {
                idom[node.index()] = new_idom;
                changed = true;
            }
        }
    }

    let mut children = vec![Vec::new(); node_count];
    for &node in rpo.iter().skip(1) {
        if let Some(parent) = idom[node.index()] {
            children[parent.index()].push(node);
        }
    }

    DominatorTree {
        entry,
        idom,
        children,
    }
}

fn intersect(
    idom: &[Option<NodeId>],
    rpo_index: &[usize],
    mut a: NodeId,
    mut b: NodeId,
) -> NodeId {
    while a != b {
        while rpo_index[a.index()] > rpo_index[b.index()] {
            match idom[a.index()] {
                Some(parent) => a = parent,
                None => return b,
            }
        }
        while rpo_index[b.index()] > rpo_index[a.index()] {
            match idom[b.index()] {
                Some(parent) => b = parent,
                None => return a,
            }
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::GraphBase;

    struct TestGraph {
        succs: Vec<Vec<usize>>,
        preds: Vec<Vec<usize>>,
    }

    impl TestGraph {
        fn new(node_count: usize, edges: &[(usize, usize)]) -> Self {
            let mut succs = vec![Vec::new(); node_count];
            let mut preds = vec![Vec::new(); node_count];
            for &(from, to) in edges {
                succs[from].push(to);
                preds[to].push(from);
            }
            Self { succs, preds }
        }
    }

    impl GraphBase for TestGraph {
        fn node_count(&self) -> usize {
            self.succs.len()
        }

        fn node_ids(&self) -> impl Iterator<Item = NodeId> {
            (0..self.succs.len()).map(NodeId::new)
        }
    }

    impl Successors for TestGraph {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.succs[node.index()].iter().copied().map(NodeId::new)
        }
    }

    impl Predecessors for TestGraph {
        fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.preds[node.index()].iter().copied().map(NodeId::new)
        }
    }

    fn n(index: usize) -> NodeId {
        NodeId::new(index)
    }

    #[test]
    fn test_diamond() {
        let graph = TestGraph::new(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let tree = compute_dominators(&graph, n(0));

        assert_eq!(tree.immediate_dominator(n(0)), None);
        assert_eq!(tree.immediate_dominator(n(1)), Some(n(0)));
        assert_eq!(tree.immediate_dominator(n(3)), Some(n(0)));
        assert!(tree.dominates(n(0), n(3)));
        assert!(!tree.dominates(n(1), n(3)));
    }

    #[test]
    fn test_loop() {
        // 0 -> 1 -> 2 -> 1, 2 -> 3
        let graph = TestGraph::new(4, &[(0, 1), (1, 2), (2, 1), (2, 3)]);
        let tree = compute_dominators(&graph, n(0));

        assert_eq!(tree.immediate_dominator(n(2)), Some(n(1)));
        assert_eq!(tree.immediate_dominator(n(3)), Some(n(2)));
        assert!(tree.dominates(n(1), n(3)));
    }

    #[test]
    fn test_unreachable_nodes() {
        let graph = TestGraph::new(3, &[(0, 1), (2, 1)]);
        let tree = compute_dominators(&graph, n(0));

        assert!(!tree.is_reachable(n(2)));
        assert_eq!(tree.immediate_dominator(n(1)), Some(n(0)));
        assert!(!tree.dominates(n(0), n(2)));
        assert_eq!(tree.preorder(), vec![n(0), n(1)]);
    }

    #[test]
    fn test_preorder_places_dominators_first() {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3, 3 -> 4
        let graph = TestGraph::new(5, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)]);
        let tree = compute_dominators(&graph, n(0));
        let order = tree.preorder();

        assert_eq!(order.len(), 5);
        for (position, &node) in order.iter().enumerate() {
            if let Some(parent) = tree.immediate_dominator(node) {
                let parent_position = order.iter().position(|&x| x == parent).unwrap();
                assert!(parent_position < position);
            }
        }
        assert_eq!(tree.children(n(3)), &[n(4)]);
    }
}
