//! Generic directed graph with cached topological queries.
//!
//! Nodes and edges live in insertion-order arenas and are addressed by
//! opaque integer handles, so handle equality and hashing are well-defined
//! regardless of the payload types. Depth and adjacency answers are memoized
//! per cache epoch; any structural mutation starts a new epoch.

use std::cell::RefCell;
use std::collections::VecDeque;

use thiserror::Error;

/// Handle of a node added to a [`DirectedGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Handle of an edge added to a [`DirectedGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    #[error("node #{} is not registered in the graph", .0.0)]
    NodeNotFound(NodeId),
    #[error("edge #{} is not registered in the graph", .0.0)]
    EdgeNotFound(EdgeId),
    #[error("the graph contains a cycle; depth is undefined")]
    CycleDetected,
}

#[derive(Debug, Clone)]
struct EdgeRecord<E> {
    source: NodeId,
    target: NodeId,
    payload: E,
}

#[derive(Debug, Clone, Default)]
struct NodeAdjacency {
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

/// Directed multigraph over opaque node and edge payloads.
///
/// Depth queries treat the graph as a DAG: a node's depth is the longest
/// path from any source-less node, computed iteratively in one sweep and
/// memoized for the whole graph. A cycle surfaces as
/// [`GraphError::CycleDetected`] rather than diverging.
#[derive(Debug, Default)]
pub struct DirectedGraph<N, E> {
    nodes: Vec<N>,
    edges: Vec<EdgeRecord<E>>,
    depth_cache: RefCell<Option<Vec<usize>>>,
    adjacency_cache: RefCell<Option<Vec<NodeAdjacency>>>,
}

impl<N, E> DirectedGraph<N, E> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            depth_cache: RefCell::new(None),
            adjacency_cache: RefCell::new(None),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node handles in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Node payloads in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter()
    }

    /// Edge payloads in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &E> {
        self.edges.iter().map(|record| &record.payload)
    }

    /// Edge handles in insertion order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len()).map(EdgeId)
    }

    pub fn add_node(&mut self, payload: N) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(payload);
        self.clear_caches();
        id
    }

    /// Records a directed edge. Both endpoints must already be part of the
    /// graph; referencing a foreign handle is a caller error.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, payload: E) -> Result<EdgeId, GraphError> {
        self.check_node(source)?;
        self.check_node(target)?;

        let id = EdgeId(self.edges.len());
        self.edges.push(EdgeRecord {
            source,
            target,
            payload,
        });
        self.clear_caches();
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&N, GraphError> {
        self.nodes.get(id.0).ok_or(GraphError::NodeNotFound(id))
    }

    /// Mutable access to a node payload. Payload mutation cannot change the
    /// topology, so the caches stay valid.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut N, GraphError> {
        self.nodes.get_mut(id.0).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&E, GraphError> {
        self.edges
            .get(id.0)
            .map(|record| &record.payload)
            .ok_or(GraphError::EdgeNotFound(id))
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Result<&mut E, GraphError> {
        self.edges
            .get_mut(id.0)
            .map(|record| &mut record.payload)
            .ok_or(GraphError::EdgeNotFound(id))
    }

    pub fn edge_source(&self, id: EdgeId) -> Result<NodeId, GraphError> {
        self.edges
            .get(id.0)
            .map(|record| record.source)
            .ok_or(GraphError::EdgeNotFound(id))
    }

    pub fn edge_target(&self, id: EdgeId) -> Result<NodeId, GraphError> {
        self.edges
            .get(id.0)
            .map(|record| record.target)
            .ok_or(GraphError::EdgeNotFound(id))
    }

    /// Edges whose target is `node`, in insertion order.
    pub fn incoming_edges(&self, node: NodeId) -> Result<Vec<EdgeId>, GraphError> {
        self.check_node(node)?;
        if let Some(adjacency) = self.adjacency_cache.borrow().as_ref() {
            return Ok(adjacency[node.0].incoming.clone());
        }

        let adjacency = self.compute_adjacency();
        let incoming = adjacency[node.0].incoming.clone();
        *self.adjacency_cache.borrow_mut() = Some(adjacency);
        Ok(incoming)
    }

    /// Edges whose source is `node`, in insertion order.
    pub fn outgoing_edges(&self, node: NodeId) -> Result<Vec<EdgeId>, GraphError> {
        self.check_node(node)?;
        if let Some(adjacency) = self.adjacency_cache.borrow().as_ref() {
            return Ok(adjacency[node.0].outgoing.clone());
        }

        let adjacency = self.compute_adjacency();
        let outgoing = adjacency[node.0].outgoing.clone();
        *self.adjacency_cache.borrow_mut() = Some(adjacency);
        Ok(outgoing)
    }

    /// All edges touching `node`, incoming first.
    pub fn edges_of(&self, node: NodeId) -> Result<Vec<EdgeId>, GraphError> {
        let mut edges = self.incoming_edges(node)?;
        edges.extend(self.outgoing_edges(node)?);
        Ok(edges)
    }

    /// Direct predecessors of `node` (one entry per incoming edge).
    pub fn node_sources(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.incoming_edges(node)?
            .into_iter()
            .map(|edge| self.edge_source(edge))
            .collect()
    }

    /// Direct successors of `node` (one entry per outgoing edge).
    pub fn node_targets(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.outgoing_edges(node)?
            .into_iter()
            .map(|edge| self.edge_target(edge))
            .collect()
    }

    /// Longest path length from any source-less node to `node`.
    pub fn max_node_depth(&self, node: NodeId) -> Result<usize, GraphError> {
        self.check_node(node)?;
        if let Some(depths) = self.depth_cache.borrow().as_ref() {
            return Ok(depths[node.0]);
        }

        let depths = self.compute_depths()?;
        let depth = depths[node.0];
        *self.depth_cache.borrow_mut() = Some(depths);
        Ok(depth)
    }

    /// Maximum depth over all nodes; 0 for an empty graph.
    pub fn diameter(&self) -> Result<usize, GraphError> {
        let mut diameter = 0;
        for node in self.node_ids() {
            diameter = diameter.max(self.max_node_depth(node)?);
        }
        Ok(diameter)
    }

    /// All nodes whose depth equals `depth`, in insertion order.
    pub fn nodes_at_depth(&self, depth: usize) -> Result<Vec<NodeId>, GraphError> {
        let mut nodes = Vec::new();
        for node in self.node_ids() {
            if self.max_node_depth(node)? == depth {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn check_node(&self, id: NodeId) -> Result<(), GraphError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }

    fn clear_caches(&mut self) {
        *self.depth_cache.borrow_mut() = None;
        *self.adjacency_cache.borrow_mut() = None;
    }

    fn compute_adjacency(&self) -> Vec<NodeAdjacency> {
        let mut adjacency = vec![NodeAdjacency::default(); self.nodes.len()];
        for (index, record) in self.edges.iter().enumerate() {
            adjacency[record.target.0].incoming.push(EdgeId(index));
            adjacency[record.source.0].outgoing.push(EdgeId(index));
        }
        adjacency
    }

    /// Longest-path depth for every node at once, via Kahn's algorithm over
    /// a scratch in-degree table. Without the shared memo this computation
    /// is exponential, so the whole table is filled in one sweep.
    fn compute_depths(&self) -> Result<Vec<usize>, GraphError> {
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        let mut indegree = vec![0usize; self.nodes.len()];

        for (index, record) in self.edges.iter().enumerate() {
            outgoing[record.source.0].push(index);
            indegree[record.target.0] += 1;
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&node| indegree[node] == 0)
            .collect();

        let mut depths = vec![0usize; self.nodes.len()];
        let mut visited = 0usize;

        while let Some(node) = queue.pop_front() {
            visited += 1;

            for &edge in &outgoing[node] {
                let target = self.edges[edge].target.0;
                depths[target] = depths[target].max(depths[node] + 1);
                indegree[target] -= 1;
                if indegree[target] == 0 {
                    queue.push_back(target);
                }
            }
        }

        if visited != self.nodes.len() {
            return Err(GraphError::CycleDetected);
        }

        Ok(depths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(len: usize) -> (DirectedGraph<usize, ()>, Vec<NodeId>) {
        let mut graph = DirectedGraph::new();
        let nodes: Vec<NodeId> = (0..len).map(|i| graph.add_node(i)).collect();
        for pair in nodes.windows(2) {
            graph.add_edge(pair[0], pair[1], ()).unwrap();
        }
        (graph, nodes)
    }

    #[test]
    fn empty_graph_has_zero_diameter() {
        let graph: DirectedGraph<(), ()> = DirectedGraph::new();
        assert_eq!(graph.diameter(), Ok(0));
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn depth_is_zero_iff_no_incoming_edges() {
        let (graph, nodes) = chain(4);
        for (index, &node) in nodes.iter().enumerate() {
            let depth = graph.max_node_depth(node).unwrap();
            let incoming = graph.incoming_edges(node).unwrap();
            assert_eq!(depth == 0, incoming.is_empty());
            assert_eq!(depth, index);
        }
    }

    #[test]
    fn depth_follows_longest_path_not_shortest() {
        // a -> b -> c and a -> c; c must sit at depth 2.
        let mut graph = DirectedGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, c, ()).unwrap();
        graph.add_edge(a, c, ()).unwrap();

        assert_eq!(graph.max_node_depth(c), Ok(2));
        assert_eq!(graph.diameter(), Ok(2));
    }

    #[test]
    fn diamond_scenario_depths() {
        let mut graph = DirectedGraph::new();
        let n1 = graph.add_node(1);
        let n2 = graph.add_node(2);
        let n3 = graph.add_node(3);
        let n4 = graph.add_node(4);
        let n5 = graph.add_node(5);
        let n6 = graph.add_node(6);
        graph.add_edge(n1, n3, 50.0).unwrap();
        graph.add_edge(n2, n3, 100.0).unwrap();
        graph.add_edge(n3, n4, 25.0).unwrap();
        graph.add_edge(n3, n5, 50.0).unwrap();
        graph.add_edge(n3, n6, 75.0).unwrap();

        assert_eq!(graph.diameter(), Ok(2));
        assert_eq!(graph.max_node_depth(n3), Ok(1));
        assert_eq!(graph.nodes_at_depth(0).unwrap(), vec![n1, n2]);
        assert_eq!(graph.nodes_at_depth(2).unwrap(), vec![n4, n5, n6]);
    }

    #[test]
    fn diameter_matches_max_depth_over_nodes() {
        let (graph, nodes) = chain(6);
        let max_depth = nodes
            .iter()
            .map(|&node| graph.max_node_depth(node).unwrap())
            .max()
            .unwrap();
        assert_eq!(graph.diameter().unwrap(), max_depth);
    }

    #[test]
    fn cycle_is_rejected_with_explicit_error() {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, a, ()).unwrap();

        assert_eq!(graph.max_node_depth(a), Err(GraphError::CycleDetected));
        assert_eq!(graph.diameter(), Err(GraphError::CycleDetected));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node("a");
        graph.add_edge(a, a, ()).unwrap();
        assert_eq!(graph.max_node_depth(a), Err(GraphError::CycleDetected));
    }

    #[test]
    fn adding_an_edge_invalidates_the_depth_memo() {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        assert_eq!(graph.max_node_depth(b), Ok(0));

        graph.add_edge(a, b, ()).unwrap();
        assert_eq!(graph.max_node_depth(b), Ok(1));
    }

    #[test]
    fn adding_a_node_invalidates_caches_too() {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.add_edge(a, b, ()).unwrap();
        assert_eq!(graph.nodes_at_depth(0).unwrap(), vec![a]);

        let c = graph.add_node("c");
        assert_eq!(graph.nodes_at_depth(0).unwrap(), vec![a, c]);
    }

    #[test]
    fn adjacency_queries_preserve_insertion_order() {
        let mut graph = DirectedGraph::new();
        let hub = graph.add_node("hub");
        let x = graph.add_node("x");
        let y = graph.add_node("y");
        let first = graph.add_edge(hub, y, "hub->y").unwrap();
        let second = graph.add_edge(hub, x, "hub->x").unwrap();
        let third = graph.add_edge(x, hub, "x->hub").unwrap();

        assert_eq!(graph.outgoing_edges(hub).unwrap(), vec![first, second]);
        assert_eq!(graph.incoming_edges(hub).unwrap(), vec![third]);
        assert_eq!(graph.edges_of(hub).unwrap(), vec![third, first, second]);
        assert_eq!(graph.node_targets(hub).unwrap(), vec![y, x]);
        assert_eq!(graph.node_sources(hub).unwrap(), vec![x]);
    }

    #[test]
    fn edge_lookup_fails_for_unknown_handle() {
        let graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let missing = EdgeId(7);
        assert_eq!(graph.edge_source(missing), Err(GraphError::EdgeNotFound(missing)));
        assert_eq!(graph.edge_target(missing), Err(GraphError::EdgeNotFound(missing)));
    }

    #[test]
    fn edge_endpoints_must_exist_before_adding() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("a");
        let stranger = NodeId(9);
        assert_eq!(
            graph.add_edge(a, stranger, ()),
            Err(GraphError::NodeNotFound(stranger))
        );
    }
}
