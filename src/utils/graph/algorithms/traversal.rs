//! Depth-first orderings.

use crate::utils::graph::{NodeId, Successors};

/// Returns the nodes reachable from `start` in depth-first postorder.
///
/// Successors are explored in the order the graph yields them. Unreachable
/// nodes are not part of the result. An out-of-range `start` yields an empty
/// vector.
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    // (node, successors, next successor to visit)
    let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> = Vec::new();
    visited[start.index()] = true;
    stack.push((start, graph.successors(start).collect(), 0));

    while let Some((node, successors, cursor)) = stack.last_mut() {
        if let Some(&next) = successors.get(*cursor) {
            *cursor += 1;
            if next.index() < node_count && !visited[next.index()] {
                visited[next.index()] = true;
                let next_successors = graph.successors(next).collect();
                stack.push((next, next_successors, 0));
            }
        } else {
            result.push(*node);
            stack.pop();
        }
    }

    result
}

/// Returns the nodes reachable from `start` in reverse postorder.
///
/// In reverse postorder every node appears before its successors, back edges
/// excepted.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}

/// Returns the reverse postorder from `start` together with the position of
/// every node in it. Unreachable nodes get `usize::MAX`.
pub(crate) fn reverse_postorder_index<G: Successors>(
    graph: &G,
    start: NodeId,
) -> (Vec<NodeId>, Vec<usize>) {
    let order = reverse_postorder(graph, start);
    let mut index = vec![usize::MAX; graph.node_count()];
    for (position, node) in order.iter().enumerate() {
        index[node.index()] = position;
    }
    (order, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::GraphBase;

    struct Adjacency(Vec<Vec<usize>>);

    impl GraphBase for Adjacency {
        fn node_count(&self) -> usize {
            self.0.len()
        }

        fn node_ids(&self) -> impl Iterator<Item = NodeId> {
            (0..self.0.len()).map(NodeId::new)
        }
    }

    impl Successors for Adjacency {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.0[node.index()].iter().copied().map(NodeId::new)
        }
    }

    #[test]
    fn test_postorder_diamond() {
        // 0 -> 1 -> 3, 0 -> 2 -> 3
        let graph = Adjacency(vec![vec![1, 2], vec![3], vec![3], vec![]]);
        let order: Vec<usize> = postorder(&graph, NodeId::new(0))
            .into_iter()
            .map(NodeId::index)
            .collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_reverse_postorder_skips_unreachable() {
        let graph = Adjacency(vec![vec![1], vec![0], vec![1]]);
        let order = reverse_postorder(&graph, NodeId::new(0));
        assert_eq!(order, vec![NodeId::new(0), NodeId::new(1)]);
    }

    #[test]
    fn test_postorder_invalid_start() {
        let graph = Adjacency(vec![vec![]]);
        assert!(postorder(&graph, NodeId::new(5)).is_empty());
    }
}
