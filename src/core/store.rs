//! Pooled node / arc / label storage and the structural mutators that keep
//! the intrusive arc lists consistent.
//!
//! The graph lives in three [`SlotMap`] pools indexed by [`NodeKey`],
//! [`ArcKey`] and [`LabelKey`]. Keys stay valid across insertions and
//! removals, freed slots are recycled through the map's internal free list,
//! and a missing link is an explicit `None` rather than a sentinel id.
//!
//! Arcs are threaded through two intrusive doubly-linked lists at once: the
//! *up list* of their lower node and the *down list* of their upper node.
//! All list surgery is O(1); degree queries walk the lists.
//!
//! # Ordering
//!
//! Every arc is directed from its lower node to its higher node under the
//! total order `(value, vertex_id)` — equal scalar values are disambiguated
//! by the originating mesh vertex id, so the order is strict for distinct
//! vertices. [`GraphStore::less`] is the single source of truth for this
//! comparison.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use thiserror::Error;

/// Mesh vertex identifier, stable across the whole stream.
pub type VertexId = u64;

/// Opaque identifier of a label track (one per mesh edge during streaming).
pub type LabelTag = u64;

/// Slot count reserved in each pool up front.
pub(crate) const INITIAL_POOL_CAPACITY: usize = 1024;

new_key_type! {
    /// Key of a live [`ReebNode`] in the node pool.
    pub struct NodeKey;
}

new_key_type! {
    /// Key of a live [`ReebArc`] in the arc pool.
    pub struct ArcKey;
}

new_key_type! {
    /// Key of a live [`ReebLabel`] in the label pool.
    pub struct LabelKey;
}

/// A distinct scalar sample in the current graph.
///
/// Nodes are created the first time a mesh vertex participates in a streamed
/// simplex and die when a vertex collapse absorbs them into an arc interior.
#[derive(Clone, Debug)]
pub struct ReebNode {
    /// Originating mesh vertex id.
    pub vertex_id: VertexId,
    /// Scalar field value at the vertex.
    pub value: f64,
    /// Head of the intrusive list of arcs arriving from below.
    pub(crate) arc_down: Option<ArcKey>,
    /// Head of the intrusive list of arcs leaving upward.
    pub(crate) arc_up: Option<ArcKey>,
    /// True once every incident mesh simplex has been streamed.
    pub is_finalized: bool,
    /// True when the node's topological role (minimum, maximum, split or
    /// join) has been confirmed. Cleared again if later surgery leaves the
    /// node at degree (1, 1).
    pub is_critical: bool,
}

/// A directed edge from a lower node `n0` to a higher node `n1`.
#[derive(Clone, Debug)]
pub struct ReebArc {
    /// Lower endpoint.
    pub n0: NodeKey,
    /// Upper endpoint; `less(n0, n1)` always holds.
    pub n1: NodeKey,
    /// Previous sibling in `n0`'s up list.
    pub(crate) up_prev: Option<ArcKey>,
    /// Next sibling in `n0`'s up list.
    pub(crate) up_next: Option<ArcKey>,
    /// Previous sibling in `n1`'s down list.
    pub(crate) down_prev: Option<ArcKey>,
    /// Next sibling in `n1`'s down list.
    pub(crate) down_next: Option<ArcKey>,
    /// First label of the arc's horizontal chain.
    pub(crate) label_head: Option<LabelKey>,
    /// Last label of the arc's horizontal chain.
    pub(crate) label_tail: Option<LabelKey>,
    /// `(vertex_id, value)` samples absorbed from collapsed interior nodes,
    /// harvested by the publisher for edge vertex lists.
    pub(crate) samples: SmallVec<[(VertexId, f64); 2]>,
}

impl ReebArc {
    /// Interior samples absorbed into this arc, in insertion order.
    #[must_use]
    pub fn samples(&self) -> &[(VertexId, f64)] {
        &self.samples
    }
}

/// Record that a label track currently traverses an arc.
///
/// The horizontal chain links all labels on one arc; the vertical chain
/// links the labels of one tag across the consecutive arcs it spans,
/// monotone in scalar order.
#[derive(Clone, Debug)]
pub struct ReebLabel {
    pub(crate) arc: ArcKey,
    pub(crate) tag: LabelTag,
    pub(crate) h_prev: Option<LabelKey>,
    pub(crate) h_next: Option<LabelKey>,
    pub(crate) v_prev: Option<LabelKey>,
    pub(crate) v_next: Option<LabelKey>,
}

/// Structural invariant violations reported by [`GraphStore::is_valid`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StoreValidationError {
    /// An arc's endpoints are not strictly ascending.
    #[error("arc {arc:?} is not ascending in (value, vertex id) order")]
    ArcNotMonotone {
        /// The offending arc.
        arc: ArcKey,
    },
    /// An intrusive arc list is inconsistent.
    #[error("arc list of node {node:?} is inconsistent: {message}")]
    ArcListCorrupt {
        /// Owner of the corrupt list.
        node: NodeKey,
        /// What went wrong.
        message: String,
    },
    /// A label chain is inconsistent.
    #[error("label chain inconsistency: {message}")]
    LabelChainCorrupt {
        /// What went wrong.
        message: String,
    },
    /// A node's scalar value escapes the recorded range.
    #[error("node {node:?} has value {value} outside [{min}, {max}]")]
    ValueOutOfRange {
        /// The offending node.
        node: NodeKey,
        /// Its scalar value.
        value: f64,
        /// Recorded minimum.
        min: f64,
        /// Recorded maximum.
        max: f64,
    },
}

/// The three pools plus the running scalar range.
#[derive(Clone, Debug)]
pub struct GraphStore {
    pub(crate) nodes: SlotMap<NodeKey, ReebNode>,
    pub(crate) arcs: SlotMap<ArcKey, ReebArc>,
    pub(crate) labels: SlotMap<LabelKey, ReebLabel>,
    pub(crate) min_value: f64,
    pub(crate) max_value: f64,
}

impl GraphStore {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
            arcs: SlotMap::with_capacity_and_key(capacity),
            labels: SlotMap::with_capacity_and_key(capacity),
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
        }
    }

    /// Number of live nodes.
    #[must_use]
    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live arcs.
    #[must_use]
    pub fn number_of_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Number of live labels.
    #[must_use]
    pub fn number_of_labels(&self) -> usize {
        self.labels.len()
    }

    /// Width of the scalar range seen so far, 0 for an empty graph.
    #[must_use]
    pub fn scalar_span(&self) -> f64 {
        if self.nodes.is_empty() {
            0.0
        } else {
            (self.max_value - self.min_value).max(0.0)
        }
    }

    /// Strict total order on nodes: by value, ties by vertex id.
    #[must_use]
    pub fn less(&self, a: NodeKey, b: NodeKey) -> bool {
        let na = &self.nodes[a];
        let nb = &self.nodes[b];
        na.value < nb.value || (na.value == nb.value && na.vertex_id < nb.vertex_id)
    }

    #[must_use]
    pub(crate) fn contains_node(&self, n: NodeKey) -> bool {
        self.nodes.contains_key(n)
    }

    #[must_use]
    pub(crate) fn contains_arc(&self, a: ArcKey) -> bool {
        self.arcs.contains_key(a)
    }

    pub(crate) fn new_node(&mut self, vertex_id: VertexId, value: f64) -> NodeKey {
        self.min_value = self.min_value.min(value);
        self.max_value = self.max_value.max(value);
        self.nodes.insert(ReebNode {
            vertex_id,
            value,
            arc_down: None,
            arc_up: None,
            is_finalized: false,
            is_critical: false,
        })
    }

    /// Creates an arc `lo → hi` and links it into both endpoint lists.
    pub(crate) fn insert_arc(&mut self, lo: NodeKey, hi: NodeKey) -> ArcKey {
        debug_assert!(self.less(lo, hi), "arc endpoints must be strictly ascending");
        let a = self.arcs.insert(ReebArc {
            n0: lo,
            n1: hi,
            up_prev: None,
            up_next: None,
            down_prev: None,
            down_next: None,
            label_head: None,
            label_tail: None,
            samples: SmallVec::new(),
        });
        self.add_up_arc(lo, a);
        self.add_down_arc(hi, a);
        a
    }

    /// Prepends `a` to `n`'s up list.
    pub(crate) fn add_up_arc(&mut self, n: NodeKey, a: ArcKey) {
        let old_head = self.nodes[n].arc_up;
        {
            let arc = &mut self.arcs[a];
            arc.up_prev = None;
            arc.up_next = old_head;
        }
        if let Some(h) = old_head {
            self.arcs[h].up_prev = Some(a);
        }
        self.nodes[n].arc_up = Some(a);
    }

    /// Prepends `a` to `n`'s down list.
    pub(crate) fn add_down_arc(&mut self, n: NodeKey, a: ArcKey) {
        let old_head = self.nodes[n].arc_down;
        {
            let arc = &mut self.arcs[a];
            arc.down_prev = None;
            arc.down_next = old_head;
        }
        if let Some(h) = old_head {
            self.arcs[h].down_prev = Some(a);
        }
        self.nodes[n].arc_down = Some(a);
    }

    /// Unlinks `a` from its lower node's up list.
    pub(crate) fn remove_up_arc(&mut self, a: ArcKey) {
        let (owner, prev, next) = {
            let arc = &self.arcs[a];
            (arc.n0, arc.up_prev, arc.up_next)
        };
        match prev {
            Some(p) => self.arcs[p].up_next = next,
            None => self.nodes[owner].arc_up = next,
        }
        if let Some(x) = next {
            self.arcs[x].up_prev = prev;
        }
        let arc = &mut self.arcs[a];
        arc.up_prev = None;
        arc.up_next = None;
    }

    /// Unlinks `a` from its upper node's down list.
    pub(crate) fn remove_down_arc(&mut self, a: ArcKey) {
        let (owner, prev, next) = {
            let arc = &self.arcs[a];
            (arc.n1, arc.down_prev, arc.down_next)
        };
        match prev {
            Some(p) => self.arcs[p].down_next = next,
            None => self.nodes[owner].arc_down = next,
        }
        if let Some(x) = next {
            self.arcs[x].down_prev = prev;
        }
        let arc = &mut self.arcs[a];
        arc.down_prev = None;
        arc.down_next = None;
    }

    /// Number of arcs arriving at `n` from below.
    #[must_use]
    pub fn down_degree(&self, n: NodeKey) -> usize {
        let mut count = 0;
        let mut cur = self.nodes[n].arc_down;
        while let Some(a) = cur {
            count += 1;
            cur = self.arcs[a].down_next;
        }
        count
    }

    /// Number of arcs leaving `n` upward.
    #[must_use]
    pub fn up_degree(&self, n: NodeKey) -> usize {
        let mut count = 0;
        let mut cur = self.nodes[n].arc_up;
        while let Some(a) = cur {
            count += 1;
            cur = self.arcs[a].up_next;
        }
        count
    }

    /// O(1) check for exactly one down arc and exactly one up arc.
    #[must_use]
    pub(crate) fn is_degree_one_one(&self, n: NodeKey) -> bool {
        let node = &self.nodes[n];
        let single_down = node
            .arc_down
            .is_some_and(|a| self.arcs[a].down_next.is_none());
        let single_up = node.arc_up.is_some_and(|a| self.arcs[a].up_next.is_none());
        single_down && single_up
    }

    /// A finalized, non-critical, degree-(1,1) node: invisible to the
    /// published graph and eligible for collapse.
    #[must_use]
    pub fn is_regular(&self, n: NodeKey) -> bool {
        let node = &self.nodes[n];
        node.is_finalized && !node.is_critical && self.is_degree_one_one(n)
    }

    /// Splices the single down arc and single up arc of a degree-(1,1) node
    /// into one arc spanning past it.
    ///
    /// The up arc's labels are folded onto the survivor (dropping duplicate
    /// tags and rethreading their vertical chains), its samples move over,
    /// and the collapsed node contributes its own `(vertex_id, value)`
    /// sample. Returns the surviving arc.
    pub(crate) fn vertex_collapse(&mut self, n: NodeKey) -> ArcKey {
        let (Some(a0), Some(a1)) = (self.nodes[n].arc_down, self.nodes[n].arc_up) else {
            unreachable!("vertex_collapse requires a degree-(1,1) node");
        };
        debug_assert!(self.is_degree_one_one(n));

        let w = self.arcs[a1].n1;
        let (a1_prev, a1_next) = {
            let a = &self.arcs[a1];
            (a.down_prev, a.down_next)
        };
        // a0 takes a1's exact position in w's down list
        {
            let a = &mut self.arcs[a0];
            a.n1 = w;
            a.down_prev = a1_prev;
            a.down_next = a1_next;
        }
        match a1_prev {
            Some(p) => self.arcs[p].down_next = Some(a0),
            None => self.nodes[w].arc_down = Some(a0),
        }
        if let Some(x) = a1_next {
            self.arcs[x].down_prev = Some(a0);
        }

        self.transfer_labels(a1, a0);

        let absorbed = std::mem::take(&mut self.arcs[a1].samples);
        self.arcs[a0].samples.extend(absorbed);
        let (vid, value) = {
            let node = &self.nodes[n];
            (node.vertex_id, node.value)
        };
        self.arcs[a0].samples.push((vid, value));

        self.arcs.remove(a1);
        self.nodes.remove(n);
        a0
    }

    /// Arcs leaving `n` upward, in list order.
    pub fn up_arcs(&self, n: NodeKey) -> ArcListIter<'_> {
        ArcListIter {
            store: self,
            cur: self.nodes[n].arc_up,
            upward: true,
        }
    }

    /// Arcs arriving at `n` from below, in list order.
    pub fn down_arcs(&self, n: NodeKey) -> ArcListIter<'_> {
        ArcListIter {
            store: self,
            cur: self.nodes[n].arc_down,
            upward: false,
        }
    }

    /// Checks arc monotonicity, intrusive-list consistency, label chain
    /// well-formedness and the scalar range invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn is_valid(&self) -> Result<(), StoreValidationError> {
        for (nk, node) in &self.nodes {
            let mut prev = None;
            let mut cur = node.arc_up;
            while let Some(a) = cur {
                let arc = &self.arcs[a];
                if arc.n0 != nk {
                    return Err(StoreValidationError::ArcListCorrupt {
                        node: nk,
                        message: format!("up-list arc {a:?} has a different lower node"),
                    });
                }
                if arc.up_prev != prev {
                    return Err(StoreValidationError::ArcListCorrupt {
                        node: nk,
                        message: format!("up-list back link of arc {a:?} is wrong"),
                    });
                }
                prev = Some(a);
                cur = arc.up_next;
            }
            let mut prev = None;
            let mut cur = node.arc_down;
            while let Some(a) = cur {
                let arc = &self.arcs[a];
                if arc.n1 != nk {
                    return Err(StoreValidationError::ArcListCorrupt {
                        node: nk,
                        message: format!("down-list arc {a:?} has a different upper node"),
                    });
                }
                if arc.down_prev != prev {
                    return Err(StoreValidationError::ArcListCorrupt {
                        node: nk,
                        message: format!("down-list back link of arc {a:?} is wrong"),
                    });
                }
                prev = Some(a);
                cur = arc.down_next;
            }
            if node.value < self.min_value || node.value > self.max_value {
                return Err(StoreValidationError::ValueOutOfRange {
                    node: nk,
                    value: node.value,
                    min: self.min_value,
                    max: self.max_value,
                });
            }
        }

        for (ak, arc) in &self.arcs {
            if !self.less(arc.n0, arc.n1) {
                return Err(StoreValidationError::ArcNotMonotone { arc: ak });
            }
        }

        self.validate_label_chains()
    }
}

/// Iterator over one node's intrusive arc list.
pub struct ArcListIter<'a> {
    store: &'a GraphStore,
    cur: Option<ArcKey>,
    upward: bool,
}

impl Iterator for ArcListIter<'_> {
    type Item = ArcKey;

    fn next(&mut self) -> Option<Self::Item> {
        let a = self.cur?;
        let arc = &self.store.arcs[a];
        self.cur = if self.upward { arc.up_next } else { arc.down_next };
        Some(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_node_store() -> (GraphStore, NodeKey, NodeKey, NodeKey) {
        let mut store = GraphStore::with_capacity(16);
        let a = store.new_node(0, 0.0);
        let b = store.new_node(1, 1.0);
        let c = store.new_node(2, 2.0);
        (store, a, b, c)
    }

    #[test]
    fn scalar_range_tracks_node_creation() {
        let (store, ..) = three_node_store();
        assert_eq!(store.min_value, 0.0);
        assert_eq!(store.max_value, 2.0);
        assert_eq!(store.scalar_span(), 2.0);
    }

    #[test]
    fn less_breaks_ties_by_vertex_id() {
        let mut store = GraphStore::with_capacity(4);
        let a = store.new_node(3, 1.0);
        let b = store.new_node(7, 1.0);
        assert!(store.less(a, b));
        assert!(!store.less(b, a));
    }

    #[test]
    fn insert_arc_links_both_lists() {
        let (mut store, a, b, c) = three_node_store();
        let ab = store.insert_arc(a, b);
        let bc = store.insert_arc(b, c);
        assert_eq!(store.up_arcs(a).collect::<Vec<_>>(), vec![ab]);
        assert_eq!(store.down_arcs(b).collect::<Vec<_>>(), vec![ab]);
        assert_eq!(store.up_arcs(b).collect::<Vec<_>>(), vec![bc]);
        assert_eq!(store.down_arcs(c).collect::<Vec<_>>(), vec![bc]);
        assert!(store.is_valid().is_ok());
    }

    #[test]
    fn remove_restores_list_shape() {
        let (mut store, a, b, _c) = three_node_store();
        let first = store.insert_arc(a, b);
        let second = store.insert_arc(a, b);
        assert_eq!(store.up_degree(a), 2);
        store.remove_up_arc(second);
        store.remove_down_arc(second);
        store.arcs.remove(second);
        assert_eq!(store.up_arcs(a).collect::<Vec<_>>(), vec![first]);
        assert_eq!(store.down_degree(b), 1);
        assert!(store.is_valid().is_ok());
    }

    #[test]
    fn vertex_collapse_splices_and_absorbs() {
        let (mut store, a, b, c) = three_node_store();
        store.insert_arc(a, b);
        store.insert_arc(b, c);
        store.nodes[b].is_finalized = true;
        assert!(store.is_degree_one_one(b));

        let merged = store.vertex_collapse(b);
        assert_eq!(store.number_of_nodes(), 2);
        assert_eq!(store.number_of_arcs(), 1);
        assert_eq!(store.arcs[merged].n0, a);
        assert_eq!(store.arcs[merged].n1, c);
        assert_eq!(store.arcs[merged].samples(), &[(1, 1.0)]);
        assert!(store.is_valid().is_ok());
    }
}
