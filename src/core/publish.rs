//! Re-emission of the surviving graph into an externally visible form.
//!
//! The publisher walks the live pools in ascending scalar order and writes
//! one external node per critical node and one directed edge per maximal
//! monotone chain, suppressing regular interior nodes. Edge emission order
//! and interior vertex lists are fully determined by `(value, vertex_id)`
//! sorting, so publishing the same graph twice produces identical output
//! regardless of the mutation history that led there.

use ordered_float::OrderedFloat;
use slotmap::SecondaryMap;

use super::graph::ReebGraph;
use super::store::{NodeKey, VertexId};

/// Write-only sink the publisher emits into.
///
/// Node ids handed back by [`add_node`](GraphSink::add_node) are dense and
/// start at zero; edges reference them.
pub trait GraphSink {
    /// Adds an external node carrying the mesh vertex id and scalar value.
    fn add_node(&mut self, vertex_id: VertexId, value: f64) -> usize;

    /// Adds a directed edge with the ordered interior vertex ids of the
    /// chain it represents.
    fn add_edge(&mut self, from: usize, to: usize, interior: &[VertexId]);
}

/// An external node: one critical point of the field.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    /// Mesh vertex id of the critical point.
    pub vertex_id: VertexId,
    /// Scalar value at the critical point.
    pub value: f64,
}

/// An external directed edge: one region of constant level-set connectivity.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphEdge {
    /// Index of the lower endpoint.
    pub from: usize,
    /// Index of the upper endpoint.
    pub to: usize,
    /// Mesh vertices interior to the region, ascending by scalar value.
    pub interior: Vec<VertexId>,
}

/// Minimal directed-graph sink with per-node vertex ids and per-edge
/// interior vertex sequences; the default publication target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirectedGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl DirectedGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directed edges.
    #[must_use]
    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }

    /// All nodes, in emission order (ascending by `(value, vertex_id)`).
    #[must_use]
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// All edges, in emission order.
    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Node by external id.
    #[must_use]
    pub fn node(&self, id: usize) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// First Betti number of the graph viewed as undirected.
    #[must_use]
    pub fn cycle_rank(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        // spanning-forest count via repeated root finding
        let mut parent: Vec<usize> = (0..self.nodes.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        let mut extra = 0usize;
        for e in &self.edges {
            let (a, b) = (find(&mut parent, e.from), find(&mut parent, e.to));
            if a == b {
                extra += 1;
            } else {
                parent[a] = b;
            }
        }
        extra
    }
}

impl GraphSink for DirectedGraph {
    fn add_node(&mut self, vertex_id: VertexId, value: f64) -> usize {
        self.nodes.push(GraphNode { vertex_id, value });
        self.nodes.len() - 1
    }

    fn add_edge(&mut self, from: usize, to: usize, interior: &[VertexId]) {
        self.edges.push(GraphEdge {
            from,
            to,
            interior: interior.to_vec(),
        });
    }
}

impl ReebGraph {
    /// Emits the surviving graph into `sink`.
    ///
    /// Regular interior nodes are suppressed; each emitted edge carries the
    /// mesh vertices of its chain (absorbed arc samples plus suppressed
    /// chain nodes), ascending by scalar value. Deterministic and free of
    /// side effects on the instance.
    pub fn publish_into(&self, sink: &mut dyn GraphSink) {
        let store = &self.store;
        let mut order: Vec<NodeKey> = store
            .nodes
            .keys()
            .filter(|&n| !store.is_regular(n))
            .collect();
        order.sort_by_key(|&n| {
            let node = &store.nodes[n];
            (OrderedFloat(node.value), node.vertex_id)
        });

        let mut external: SecondaryMap<NodeKey, usize> = SecondaryMap::new();
        for &n in &order {
            let node = &store.nodes[n];
            let id = sink.add_node(node.vertex_id, node.value);
            external.insert(n, id);
        }

        let mut edges: Vec<(usize, usize, Vec<VertexId>)> = Vec::new();
        for &n in &order {
            for first in store.up_arcs(n) {
                let mut interior: Vec<(OrderedFloat<f64>, VertexId)> = Vec::new();
                let mut arc = first;
                loop {
                    interior.extend(
                        store.arcs[arc]
                            .samples
                            .iter()
                            .map(|&(vid, value)| (OrderedFloat(value), vid)),
                    );
                    let top = store.arcs[arc].n1;
                    if !store.is_regular(top) {
                        break;
                    }
                    let node = &store.nodes[top];
                    interior.push((OrderedFloat(node.value), node.vertex_id));
                    let Some(next) = node.arc_up else { break };
                    arc = next;
                }
                interior.sort_unstable();
                let top = store.arcs[arc].n1;
                edges.push((
                    external[n],
                    external[top],
                    interior.into_iter().map(|(_, vid)| vid).collect(),
                ));
            }
        }
        edges.sort_unstable();
        for (from, to, interior) in edges {
            sink.add_edge(from, to, &interior);
        }
    }

    /// Rebuilds the internally held published view.
    pub(crate) fn publish(&mut self) {
        let mut graph = DirectedGraph::new();
        self.publish_into(&mut graph);
        self.published = graph;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_ids_are_dense() {
        let mut g = DirectedGraph::new();
        assert_eq!(g.add_node(10, 0.0), 0);
        assert_eq!(g.add_node(20, 1.0), 1);
        g.add_edge(0, 1, &[15]);

        assert_eq!(g.number_of_nodes(), 2);
        assert_eq!(g.number_of_edges(), 1);
        assert_eq!(g.edges()[0].interior, vec![15]);
    }

    #[test]
    fn cycle_rank_counts_independent_cycles() {
        let mut g = DirectedGraph::new();
        let a = g.add_node(0, 0.0);
        let b = g.add_node(1, 1.0);
        let c = g.add_node(2, 2.0);
        g.add_edge(a, b, &[]);
        g.add_edge(a, b, &[]);
        g.add_edge(b, c, &[]);
        assert_eq!(g.cycle_rank(), 1);
    }
}
