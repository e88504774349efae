//! Mesh-vertex bookkeeping for the streaming builder.
//!
//! Maps each incoming mesh vertex id to its node, remembers which vertices
//! have been finalized, and tracks optional open-simplex budgets. A caller
//! that knows the mesh connectivity can declare how many simplices reference
//! a vertex up front; the builder then finalizes the vertex the moment its
//! last simplex is streamed, which is what keeps the live graph small.
//! Vertices without a declared budget stay open until the stream closes.

use rustc_hash::FxHashMap;

use super::store::{NodeKey, VertexId};

#[derive(Clone, Debug)]
pub(crate) struct VertexEntry {
    pub(crate) node: NodeKey,
    pub(crate) finalized: bool,
}

/// Vertex-id → node mapping plus open-simplex accounting.
#[derive(Clone, Debug, Default)]
pub struct VertexRegistry {
    entries: FxHashMap<VertexId, VertexEntry>,
    budgets: FxHashMap<VertexId, u32>,
}

impl VertexRegistry {
    pub(crate) fn entry(&self, vertex_id: VertexId) -> Option<&VertexEntry> {
        self.entries.get(&vertex_id)
    }

    pub(crate) fn record(&mut self, vertex_id: VertexId, node: NodeKey) {
        let previous = self.entries.insert(
            vertex_id,
            VertexEntry {
                node,
                finalized: false,
            },
        );
        debug_assert!(previous.is_none(), "vertex {vertex_id} registered twice");
    }

    /// Declares that `count` simplices in total will reference `vertex_id`.
    ///
    /// Repeated declarations accumulate, so adjacency information may be
    /// supplied incrementally.
    pub fn declare_incidences(&mut self, vertex_id: VertexId, count: u32) {
        if count > 0 {
            *self.budgets.entry(vertex_id).or_insert(0) += count;
        }
    }

    /// Consumes one unit of `vertex_id`'s budget; true when the budget just
    /// reached zero and the vertex must be finalized.
    pub(crate) fn note_simplex(&mut self, vertex_id: VertexId) -> bool {
        let Some(budget) = self.budgets.get_mut(&vertex_id) else {
            return false;
        };
        *budget = budget.saturating_sub(1);
        if *budget == 0 {
            self.budgets.remove(&vertex_id);
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_finalized(&mut self, vertex_id: VertexId) {
        if let Some(entry) = self.entries.get_mut(&vertex_id) {
            entry.finalized = true;
        }
        self.budgets.remove(&vertex_id);
    }

    /// Every registered vertex with its entry.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (VertexId, &VertexEntry)> + '_ {
        self.entries.iter().map(|(&v, e)| (v, e))
    }

    /// Vertices whose node has not been finalized yet.
    pub(crate) fn unfinalized(&self) -> impl Iterator<Item = (VertexId, NodeKey)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| !e.finalized)
            .map(|(&v, e)| (v, e.node))
    }

    /// Number of registered vertices, finalized or not.
    #[must_use]
    pub fn number_of_vertices(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.budgets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn key() -> NodeKey {
        let mut map: SlotMap<NodeKey, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn budget_counts_down_to_finalization() {
        let mut registry = VertexRegistry::default();
        registry.record(5, key());
        registry.declare_incidences(5, 2);

        assert!(!registry.note_simplex(5));
        assert!(registry.note_simplex(5));
        // exhausted budgets stop reporting
        assert!(!registry.note_simplex(5));
    }

    #[test]
    fn undeclared_vertices_never_self_finalize() {
        let mut registry = VertexRegistry::default();
        registry.record(1, key());
        assert!(!registry.note_simplex(1));
        assert_eq!(registry.unfinalized().count(), 1);

        registry.mark_finalized(1);
        assert_eq!(registry.unfinalized().count(), 0);
    }
}
