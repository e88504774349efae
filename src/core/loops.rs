//! Loop enumeration over the closed graph.
//!
//! A disjoint-set pass over the arcs, taken in ascending order of their
//! lower endpoint, records one representative arc per independent cycle:
//! an arc whose endpoints already share a component closes a cycle and is
//! not unioned. The table size is the first Betti number of the graph, and
//! for a field on a closed orientable PL 2-manifold it equals the genus.
//! Loop simplification later consumes the table entry by entry.

use ordered_float::OrderedFloat;
use rustc_hash::FxHashSet;
use slotmap::SecondaryMap;

use super::graph::ReebGraph;
use super::store::{ArcKey, NodeKey};

/// Disjoint-set forest over node keys, with path halving.
#[derive(Debug, Default)]
pub(crate) struct UnionFind {
    parent: SecondaryMap<NodeKey, NodeKey>,
}

impl UnionFind {
    pub(crate) fn insert(&mut self, n: NodeKey) {
        self.parent.insert(n, n);
    }

    pub(crate) fn find(&mut self, mut n: NodeKey) -> NodeKey {
        while self.parent[n] != n {
            let grandparent = self.parent[self.parent[n]];
            self.parent[n] = grandparent;
            n = grandparent;
        }
        n
    }

    /// Merges the two sets; false when they were already one.
    pub(crate) fn union(&mut self, a: NodeKey, b: NodeKey) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            false
        } else {
            self.parent[ra] = rb;
            true
        }
    }
}

impl ReebGraph {
    /// Rebuilds the loop table and the connected-component count.
    pub(crate) fn find_loops(&mut self) {
        let mut forest = UnionFind::default();
        for n in self.store.nodes.keys() {
            forest.insert(n);
        }

        let mut order: Vec<ArcKey> = self.store.arcs.keys().collect();
        order.sort_unstable_by_key(|&a| {
            let arc = &self.store.arcs[a];
            let lo = &self.store.nodes[arc.n0];
            let hi = &self.store.nodes[arc.n1];
            (
                OrderedFloat(lo.value),
                lo.vertex_id,
                OrderedFloat(hi.value),
                hi.vertex_id,
            )
        });

        self.loop_arcs.clear();
        for a in order {
            let (n0, n1) = {
                let arc = &self.store.arcs[a];
                (arc.n0, arc.n1)
            };
            if !forest.union(n0, n1) {
                self.loop_arcs.push(a);
            }
        }

        let mut roots: FxHashSet<NodeKey> = FxHashSet::default();
        let keys: Vec<NodeKey> = self.store.nodes.keys().collect();
        for n in keys {
            roots.insert(forest.find(n));
        }
        self.components = roots.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn union_find_merges_and_detects() {
        let mut keys: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let c = keys.insert(());

        let mut forest = UnionFind::default();
        for k in [a, b, c] {
            forest.insert(k);
        }
        assert!(forest.union(a, b));
        assert!(forest.union(b, c));
        assert!(!forest.union(a, c));
        assert_eq!(forest.find(a), forest.find(c));
    }
}
