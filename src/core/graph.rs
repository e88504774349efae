//! The Reeb-graph instance: streaming construction and shared state.
//!
//! [`ReebGraph`] owns the pooled store, the vertex registry, the label
//! tracks and the published view. Simplices arrive one at a time through
//! [`stream_triangle`](ReebGraph::stream_triangle) and
//! [`stream_tetrahedron`](ReebGraph::stream_tetrahedron); after every
//! insertion the graph is a valid Reeb graph of the mesh streamed so far.
//!
//! # The zip
//!
//! Each mesh edge owns a persistent label tag recording which arcs the edge
//! currently spans. Inserting a triangle adds (at most) its three edges as
//! monotonic paths and then glues its interior by zipping the two short
//! edges against the long one over their shared scalar ranges
//! ([`collapse`](ReebGraph::collapse)). The zip walks both label chains in
//! lockstep, merging parallel arcs and re-anchoring whichever side reaches
//! higher, until the paths coincide.
//!
//! # Example
//!
//! ```rust
//! use reeb::prelude::*;
//!
//! let mut graph = ReebGraph::new();
//! graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
//! graph.close_stream().unwrap();
//!
//! // one arc from the minimum to the maximum; the regular vertex 1 is
//! // suppressed into the arc interior
//! let published = graph.graph();
//! assert_eq!(published.number_of_nodes(), 2);
//! assert_eq!(published.number_of_edges(), 1);
//! assert_eq!(published.edges()[0].interior, vec![1]);
//! assert_eq!(graph.number_of_loops(), 0);
//! ```

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use ordered_float::OrderedFloat;

use super::publish::DirectedGraph;
use super::registry::VertexRegistry;
use super::store::{
    ArcKey, GraphStore, LabelTag, NodeKey, ReebArc, ReebNode, StoreValidationError, VertexId,
    INITIAL_POOL_CAPACITY,
};

/// Errors surfaced by streaming and simplification entry points.
///
/// State-misuse errors leave the instance exactly as it was: every
/// precondition is checked before the first mutation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReebError {
    /// A simplex repeated a vertex id.
    #[error("simplex vertices are not distinct")]
    NotSimplicial,
    /// A stream call arrived after `close_stream`.
    #[error("the stream is closed; no more simplices can be inserted")]
    StreamClosed,
    /// `simplify` was called before `close_stream`.
    #[error("the stream is still open; call close_stream first")]
    StreamOpen,
    /// A simplex referenced a vertex whose open-simplex budget was already
    /// exhausted.
    #[error("vertex {vertex_id} was already finalized")]
    VertexFinalized {
        /// The offending mesh vertex.
        vertex_id: VertexId,
    },
    /// A vertex reappeared with a different scalar value.
    #[error("vertex {vertex_id} was first streamed with scalar {existing}, now {given}")]
    InconsistentScalar {
        /// The offending mesh vertex.
        vertex_id: VertexId,
        /// Scalar recorded at first sight.
        existing: f64,
        /// Scalar supplied now.
        given: f64,
    },
    /// A scalar value was NaN or infinite.
    #[error("vertex {vertex_id} carries a non-finite scalar {given}")]
    NonFiniteScalar {
        /// The offending mesh vertex.
        vertex_id: VertexId,
        /// The rejected value.
        given: f64,
    },
    /// The simplification threshold fell outside `[0, 1]`.
    #[error("simplification threshold {given} is outside [0, 1]")]
    InvalidThreshold {
        /// The rejected threshold.
        given: f64,
    },
}

/// Validation errors reported by [`ReebGraph::is_valid`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReebValidationError {
    /// A store-level invariant failed.
    #[error(transparent)]
    Store(#[from] StoreValidationError),
    /// The registry maps a live vertex to a node that no longer exists.
    #[error("registry maps vertex {vertex_id} to a node that no longer exists")]
    RegistryDangling {
        /// The dangling mesh vertex.
        vertex_id: VertexId,
    },
    /// The registry and the node disagree about the vertex id.
    #[error("registry vertex {vertex_id} reached a node claiming vertex {node_vertex_id}")]
    RegistryMismatch {
        /// Id under which the node is registered.
        vertex_id: VertexId,
        /// Id stored in the node.
        node_vertex_id: VertexId,
    },
}

/// One simplification step, recorded when the history is enabled: the arcs
/// that were removed and the arcs that vertex collapses created in their
/// place, as `(lower, upper)` mesh vertex pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cancellation {
    /// Endpoint vertex pairs of the removed arcs.
    pub removed_arcs: Vec<(VertexId, VertexId)>,
    /// Endpoint vertex pairs of the arcs created by the accompanying
    /// vertex collapses.
    pub inserted_arcs: Vec<(VertexId, VertexId)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
    Open,
    Closed,
}

/// Instance-level tunables.
#[derive(Builder, Clone, Copy, Debug)]
pub struct ReebSettings {
    /// Record a [`Cancellation`] per simplification step.
    #[builder(default = "false")]
    pub history_on: bool,
    /// Slots reserved in each pool before the first simplex arrives.
    #[builder(default = "INITIAL_POOL_CAPACITY")]
    pub initial_capacity: usize,
}

impl Default for ReebSettings {
    fn default() -> Self {
        Self {
            history_on: false,
            initial_capacity: INITIAL_POOL_CAPACITY,
        }
    }
}

/// Streaming Reeb graph of a piecewise-linear scalar field.
///
/// See the [module documentation](self) for the construction model. All ids
/// handed out by this type are meaningful only within this instance and only
/// until the next mutating call.
#[derive(Clone, Debug)]
pub struct ReebGraph {
    pub(crate) store: GraphStore,
    pub(crate) registry: VertexRegistry,
    state: StreamState,
    next_tag: LabelTag,
    edge_tags: FxHashMap<(VertexId, VertexId), LabelTag>,
    pub(crate) loop_arcs: Vec<ArcKey>,
    pub(crate) removed_loops: usize,
    pub(crate) components: usize,
    pub(crate) history_on: bool,
    pub(crate) history: Vec<Cancellation>,
    pub(crate) published: DirectedGraph,
}

impl Default for ReebGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ReebGraph {
    /// An empty, open instance with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(ReebSettings::default())
    }

    /// An empty, open instance with the given settings.
    #[must_use]
    pub fn with_settings(settings: ReebSettings) -> Self {
        Self {
            store: GraphStore::with_capacity(settings.initial_capacity),
            registry: VertexRegistry::default(),
            state: StreamState::Open,
            next_tag: 1,
            edge_tags: FxHashMap::default(),
            loop_arcs: Vec::new(),
            removed_loops: 0,
            components: 0,
            history_on: settings.history_on,
            history: Vec::new(),
            published: DirectedGraph::new(),
        }
    }

    /// True until [`close_stream`](Self::close_stream) succeeds.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Declares that `count` simplices in total will reference `vertex_id`,
    /// letting the builder finalize the vertex as soon as its last simplex
    /// is streamed instead of waiting for `close_stream`.
    pub fn declare_incidences(&mut self, vertex_id: VertexId, count: u32) {
        self.registry.declare_incidences(vertex_id, count);
    }

    /// Streams one triangle of the surface mesh.
    ///
    /// # Errors
    ///
    /// [`ReebError::NotSimplicial`] for repeated vertex ids,
    /// [`ReebError::StreamClosed`] after `close_stream`, plus the scalar
    /// consistency errors described on [`ReebError`]. On error the instance
    /// is unchanged.
    pub fn stream_triangle(
        &mut self,
        v0: VertexId,
        s0: f64,
        v1: VertexId,
        s1: f64,
        v2: VertexId,
        s2: f64,
    ) -> Result<(), ReebError> {
        let verts = [(v0, s0), (v1, s1), (v2, s2)];
        self.check_simplex(&verts)?;
        let keys = [self.touch(v0, s0), self.touch(v1, s1), self.touch(v2, s2)];
        self.insert_triangle(keys);
        for (v, _) in verts {
            self.finish_simplex_vertex(v);
        }
        Ok(())
    }

    /// Streams one tetrahedron of the volume mesh.
    ///
    /// The tetrahedron is decomposed into its four triangular faces, taken
    /// in lexicographic order of the value-sorted vertex triples; the result
    /// does not depend on that order.
    ///
    /// # Errors
    ///
    /// As for [`stream_triangle`](Self::stream_triangle).
    pub fn stream_tetrahedron(
        &mut self,
        v0: VertexId,
        s0: f64,
        v1: VertexId,
        s1: f64,
        v2: VertexId,
        s2: f64,
        v3: VertexId,
        s3: f64,
    ) -> Result<(), ReebError> {
        let verts = [(v0, s0), (v1, s1), (v2, s2), (v3, s3)];
        self.check_simplex(&verts)?;
        let mut keys = [
            self.touch(v0, s0),
            self.touch(v1, s1),
            self.touch(v2, s2),
            self.touch(v3, s3),
        ];
        keys.sort_unstable_by(|&a, &b| {
            if self.store.less(a, b) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });
        let [l, m1, m2, u] = keys;
        for face in [[l, m1, m2], [l, m1, u], [l, m2, u], [m1, m2, u]] {
            self.insert_triangle(face);
        }
        for (v, _) in verts {
            self.finish_simplex_vertex(v);
        }
        Ok(())
    }

    /// Finalizes the stream: remaining open vertices are finalized in scalar
    /// order, labels are flushed, loops are detected and the graph is
    /// published. Further `stream_*` calls fail with
    /// [`ReebError::StreamClosed`]; `simplify` becomes legal.
    ///
    /// To inspect an intermediate graph without ending the stream, close a
    /// [`deep_copy`](Self::deep_copy) instead.
    ///
    /// # Errors
    ///
    /// [`ReebError::StreamClosed`] if the stream was already closed.
    pub fn close_stream(&mut self) -> Result<(), ReebError> {
        self.ensure_open()?;
        let mut pending: Vec<(OrderedFloat<f64>, VertexId, NodeKey)> = self
            .registry
            .unfinalized()
            .map(|(v, n)| (OrderedFloat(self.store.nodes[n].value), v, n))
            .collect();
        pending.sort_unstable();
        for (_, v, n) in pending {
            self.end_vertex(n);
            self.registry.mark_finalized(v);
        }
        self.store.flush_labels();
        self.edge_tags.clear();
        self.find_loops();
        self.publish();
        self.state = StreamState::Closed;
        debug!(
            nodes = self.store.number_of_nodes(),
            arcs = self.store.number_of_arcs(),
            loops = self.loop_arcs.len(),
            "stream closed"
        );
        Ok(())
    }

    /// A structurally independent copy: pools, links, registry and published
    /// view are all duplicated, at cost proportional to the live slots.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    /// Number of live nodes.
    #[must_use]
    pub fn number_of_nodes(&self) -> usize {
        self.store.number_of_nodes()
    }

    /// Number of live arcs.
    #[must_use]
    pub fn number_of_arcs(&self) -> usize {
        self.store.number_of_arcs()
    }

    /// Number of independent cycles, available once the stream is closed.
    ///
    /// For a field on a closed orientable PL 2-manifold this equals the
    /// genus of the surface.
    #[must_use]
    pub fn number_of_loops(&self) -> usize {
        self.loop_arcs.len()
    }

    /// Cycles removed by loop simplification so far.
    #[must_use]
    pub fn number_of_removed_loops(&self) -> usize {
        self.removed_loops
    }

    /// Number of connected components, available once the stream is closed.
    #[must_use]
    pub fn number_of_connected_components(&self) -> usize {
        self.components
    }

    /// Live nodes with their keys.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &ReebNode)> {
        self.store.nodes.iter()
    }

    /// Live arcs with their keys.
    pub fn arcs(&self) -> impl Iterator<Item = (ArcKey, &ReebArc)> {
        self.store.arcs.iter()
    }

    /// Scalar value of a node.
    #[must_use]
    pub fn node_scalar_value(&self, n: NodeKey) -> Option<f64> {
        self.store.nodes.get(n).map(|node| node.value)
    }

    /// Mesh vertex id of a node.
    #[must_use]
    pub fn node_vertex_id(&self, n: NodeKey) -> Option<VertexId> {
        self.store.nodes.get(n).map(|node| node.vertex_id)
    }

    /// Lower endpoint of an arc.
    #[must_use]
    pub fn arc_down_node(&self, a: ArcKey) -> Option<NodeKey> {
        self.store.arcs.get(a).map(|arc| arc.n0)
    }

    /// Upper endpoint of an arc.
    #[must_use]
    pub fn arc_up_node(&self, a: ArcKey) -> Option<NodeKey> {
        self.store.arcs.get(a).map(|arc| arc.n1)
    }

    /// Arcs arriving at `n` from below.
    #[must_use]
    pub fn node_down_arcs(&self, n: NodeKey) -> Vec<ArcKey> {
        self.store.down_arcs(n).collect()
    }

    /// Arcs leaving `n` upward.
    #[must_use]
    pub fn node_up_arcs(&self, n: NodeKey) -> Vec<ArcKey> {
        self.store.up_arcs(n).collect()
    }

    /// `(min, max)` of the scalar values seen so far, `None` while empty.
    #[must_use]
    pub fn scalar_range(&self) -> Option<(f64, f64)> {
        if self.store.number_of_nodes() == 0 {
            None
        } else {
            Some((self.store.min_value, self.store.max_value))
        }
    }

    /// The most recently published view (after `close_stream` and after
    /// every `simplify`).
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph {
        &self.published
    }

    /// Cancellations recorded by the latest `simplify` call, when the
    /// history setting is on.
    #[must_use]
    pub fn cancellation_history(&self) -> &[Cancellation] {
        &self.history
    }

    /// Checks every structural invariant of the instance.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn is_valid(&self) -> Result<(), ReebValidationError> {
        self.store.is_valid()?;
        for (vertex_id, entry) in self.registry.entries() {
            if entry.finalized {
                // finalized vertices may have been collapsed away
                continue;
            }
            let Some(node) = self.store.nodes.get(entry.node) else {
                return Err(ReebValidationError::RegistryDangling { vertex_id });
            };
            if node.vertex_id != vertex_id {
                return Err(ReebValidationError::RegistryMismatch {
                    vertex_id,
                    node_vertex_id: node.vertex_id,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // streaming internals
    // ------------------------------------------------------------------

    pub(crate) fn ensure_open(&self) -> Result<(), ReebError> {
        match self.state {
            StreamState::Open => Ok(()),
            StreamState::Closed => Err(ReebError::StreamClosed),
        }
    }

    pub(crate) fn ensure_closed(&self) -> Result<(), ReebError> {
        match self.state {
            StreamState::Closed => Ok(()),
            StreamState::Open => Err(ReebError::StreamOpen),
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        self.state = StreamState::Closed;
        self.edge_tags.clear();
    }

    /// Validates a simplex before any mutation.
    fn check_simplex(&self, verts: &[(VertexId, f64)]) -> Result<(), ReebError> {
        self.ensure_open()?;
        for (i, &(v, _)) in verts.iter().enumerate() {
            if verts[i + 1..].iter().any(|&(w, _)| w == v) {
                return Err(ReebError::NotSimplicial);
            }
        }
        for &(v, s) in verts {
            if !s.is_finite() {
                return Err(ReebError::NonFiniteScalar {
                    vertex_id: v,
                    given: s,
                });
            }
            if let Some(entry) = self.registry.entry(v) {
                if entry.finalized {
                    return Err(ReebError::VertexFinalized { vertex_id: v });
                }
                let existing = self.store.nodes[entry.node].value;
                if existing != s {
                    return Err(ReebError::InconsistentScalar {
                        vertex_id: v,
                        existing,
                        given: s,
                    });
                }
            }
        }
        Ok(())
    }

    /// Node for a mesh vertex, created on first sight.
    fn touch(&mut self, vertex_id: VertexId, scalar: f64) -> NodeKey {
        if let Some(entry) = self.registry.entry(vertex_id) {
            return entry.node;
        }
        let node = self.store.new_node(vertex_id, scalar);
        self.registry.record(vertex_id, node);
        node
    }

    /// Inserts one triangle over already-touched nodes.
    fn insert_triangle(&mut self, keys: [NodeKey; 3]) {
        let mut k = keys;
        // 3-element sort by the node order
        if self.store.less(k[1], k[0]) {
            k.swap(0, 1);
        }
        if self.store.less(k[2], k[1]) {
            k.swap(1, 2);
        }
        if self.store.less(k[1], k[0]) {
            k.swap(0, 1);
        }
        let [n0, n1, n2] = k;

        let t01 = self.edge_tag(n0, n1);
        let t12 = self.edge_tag(n1, n2);
        let t02 = self.edge_tag(n0, n2);
        if self.store.find_up_label(n0, t01).is_none() {
            self.add_path(&[n0, n1], t01);
        }
        if self.store.find_up_label(n1, t12).is_none() {
            self.add_path(&[n1, n2], t12);
        }
        if self.store.find_up_label(n0, t02).is_none() {
            self.add_path(&[n0, n2], t02);
        }
        self.collapse(n0, n1, t01, t02);
        self.collapse(n1, n2, t12, t02);
    }

    /// Persistent tag of the mesh edge between two nodes.
    fn edge_tag(&mut self, a: NodeKey, b: NodeKey) -> LabelTag {
        let va = self.store.nodes[a].vertex_id;
        let vb = self.store.nodes[b].vertex_id;
        let key = (va.min(vb), va.max(vb));
        if let Some(&tag) = self.edge_tags.get(&key) {
            return tag;
        }
        let tag = self.next_tag;
        self.next_tag += 1;
        self.edge_tags.insert(key, tag);
        tag
    }

    /// Walks a node sequence, creating any missing arc between consecutive
    /// pairs and labelling each arc with `tag`. Returns the first arc.
    ///
    /// Idempotent for a repeated `(sequence, tag)`.
    pub(crate) fn add_path(&mut self, nodes: &[NodeKey], tag: LabelTag) -> Option<ArcKey> {
        let mut first = None;
        let mut prev_label = None;
        for pair in nodes.windows(2) {
            let (lo, hi) = if self.store.less(pair[0], pair[1]) {
                (pair[0], pair[1])
            } else {
                (pair[1], pair[0])
            };
            let arc = match self.find_arc(lo, hi) {
                Some(existing) => existing,
                None => self.store.insert_arc(lo, hi),
            };
            if first.is_none() {
                first = Some(arc);
            }
            prev_label = Some(self.store.set_label(arc, tag, prev_label));
        }
        first
    }

    /// An existing arc `lo → hi`, if any.
    fn find_arc(&self, lo: NodeKey, hi: NodeKey) -> Option<ArcKey> {
        self.store.up_arcs(lo).find(|&a| self.store.arcs[a].n1 == hi)
    }

    /// Zips the label chains of `tag_a` and `tag_b` together from `start`
    /// until both reach `end`.
    ///
    /// Merges parallel arcs, re-anchors whichever side reaches higher, and
    /// finally collapses any visited interior node that ended up regular.
    pub(crate) fn collapse(
        &mut self,
        start: NodeKey,
        end: NodeKey,
        tag_a: LabelTag,
        tag_b: LabelTag,
    ) {
        if start == end {
            return;
        }
        let (Some(mut l0), Some(mut l1)) = (
            self.store.find_up_label(start, tag_a),
            self.store.find_up_label(start, tag_b),
        ) else {
            debug_assert!(false, "zip tags must both label arcs leaving the start node");
            return;
        };
        let mut visited: SmallVec<[NodeKey; 8]> = SmallVec::new();
        loop {
            let a0 = self.store.labels[l0].arc;
            let a1 = self.store.labels[l1].arc;
            if a0 == a1 {
                let top = self.store.arcs[a0].n1;
                if top == end {
                    break;
                }
                visited.push(top);
                let (Some(next0), Some(next1)) = (
                    self.store.labels[l0].v_next,
                    self.store.labels[l1].v_next,
                ) else {
                    debug_assert!(false, "label chain ended before the zip reached its end");
                    break;
                };
                l0 = next0;
                l1 = next1;
            } else {
                let up0 = self.store.arcs[a0].n1;
                let up1 = self.store.arcs[a1].n1;
                if up0 == up1 {
                    self.merge_arcs(a0, a1);
                    // the transfer may have replaced the second cursor
                    let Some(next1) = self.store.arc_label_with_tag(a0, tag_b) else {
                        debug_assert!(false, "merged arc lost the zipping tag");
                        break;
                    };
                    l1 = next1;
                } else if self.store.less(up0, up1) {
                    self.reanchor(a1, up0, a0);
                    let Some(next1) = self.store.arc_label_with_tag(a0, tag_b) else {
                        debug_assert!(false, "re-anchor dropped the zipping tag bridge");
                        break;
                    };
                    l1 = next1;
                } else {
                    self.reanchor(a0, up1, a1);
                    let Some(next0) = self.store.arc_label_with_tag(a1, tag_a) else {
                        debug_assert!(false, "re-anchor dropped the zipping tag bridge");
                        break;
                    };
                    l0 = next0;
                }
            }
        }
        for n in visited {
            self.try_elide(n);
        }
    }

    /// Moves `moved` to start at `via`'s upper node, bridging every label
    /// chain that crossed the vacated span onto `via`.
    fn reanchor(&mut self, moved: ArcKey, new_lower: NodeKey, via: ArcKey) {
        debug_assert_eq!(self.store.arcs[via].n1, new_lower);
        debug_assert_eq!(self.store.arcs[via].n0, self.store.arcs[moved].n0);
        self.store.remove_up_arc(moved);
        self.store.arcs[moved].n0 = new_lower;
        self.store.add_up_arc(new_lower, moved);

        let mut cur = self.store.arcs[moved].label_head;
        while let Some(l) = cur {
            let (tag, next) = {
                let label = &self.store.labels[l];
                (label.tag, label.h_next)
            };
            if self.store.arc_label_with_tag(via, tag).is_none() {
                self.store.insert_label_before(via, tag, l);
            }
            cur = next;
        }
    }

    /// Folds `dead` (parallel to `keep`) into `keep` and deletes it.
    fn merge_arcs(&mut self, keep: ArcKey, dead: ArcKey) {
        debug_assert_eq!(self.store.arcs[keep].n0, self.store.arcs[dead].n0);
        debug_assert_eq!(self.store.arcs[keep].n1, self.store.arcs[dead].n1);
        self.store.remove_up_arc(dead);
        self.store.remove_down_arc(dead);
        self.store.transfer_labels(dead, keep);
        let samples = std::mem::take(&mut self.store.arcs[dead].samples);
        self.store.arcs[keep].samples.extend(samples);
        self.store.arcs.remove(dead);
    }

    /// Collapses `n` if it is finalized and sits at degree (1,1).
    ///
    /// A node in that position is regular whatever an earlier pass
    /// concluded, so the criticality flag is cleared before collapsing.
    pub(crate) fn try_elide(&mut self, n: NodeKey) -> Option<ArcKey> {
        if !self.store.contains_node(n) {
            return None;
        }
        if !self.store.nodes[n].is_finalized {
            return None;
        }
        if !self.store.is_degree_one_one(n) {
            return None;
        }
        self.store.nodes[n].is_critical = false;
        Some(self.store.vertex_collapse(n))
    }

    /// Finalizes a node: collapse it if regular, mark it critical otherwise.
    pub(crate) fn end_vertex(&mut self, n: NodeKey) {
        self.store.nodes[n].is_finalized = true;
        if self.try_elide(n).is_none() {
            self.store.nodes[n].is_critical = true;
        }
    }

    fn finish_simplex_vertex(&mut self, vertex_id: VertexId) {
        if self.registry.note_simplex(vertex_id) {
            if let Some(node) = self.registry.entry(vertex_id).map(|e| e.node) {
                self.end_vertex(node);
                self.registry.mark_finalized(vertex_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_triangle_collapses_to_one_arc() {
        let mut graph = ReebGraph::new();
        graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
        assert!(graph.is_valid().is_ok());
        graph.close_stream().unwrap();

        assert_eq!(graph.number_of_nodes(), 2);
        assert_eq!(graph.number_of_arcs(), 1);
        assert_eq!(graph.number_of_loops(), 0);
        assert_eq!(graph.number_of_connected_components(), 1);

        let (_, arc) = graph.arcs().next().unwrap();
        assert_eq!(arc.samples(), &[(1, 1.0)]);
    }

    #[test]
    fn duplicate_vertex_ids_are_rejected() {
        let mut graph = ReebGraph::new();
        assert_eq!(
            graph.stream_triangle(0, 0.0, 0, 1.0, 2, 2.0),
            Err(ReebError::NotSimplicial)
        );
        assert_eq!(graph.number_of_nodes(), 0);
    }

    #[test]
    fn inconsistent_scalar_leaves_instance_untouched() {
        let mut graph = ReebGraph::new();
        graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
        let before = graph.number_of_arcs();
        assert!(matches!(
            graph.stream_triangle(1, 5.0, 3, 3.0, 4, 4.0),
            Err(ReebError::InconsistentScalar { vertex_id: 1, .. })
        ));
        assert_eq!(graph.number_of_arcs(), before);
        assert!(graph.is_valid().is_ok());
    }

    #[test]
    fn stream_after_close_fails() {
        let mut graph = ReebGraph::new();
        graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
        graph.close_stream().unwrap();
        assert_eq!(
            graph.stream_triangle(3, 0.0, 4, 1.0, 5, 2.0),
            Err(ReebError::StreamClosed)
        );
        assert_eq!(graph.close_stream(), Err(ReebError::StreamClosed));
    }

    #[test]
    fn labels_are_flushed_on_close() {
        let mut graph = ReebGraph::new();
        graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
        assert!(graph.store.number_of_labels() > 0);
        graph.close_stream().unwrap();
        assert_eq!(graph.store.number_of_labels(), 0);
    }

    #[test]
    fn declared_incidences_finalize_eagerly() {
        let mut graph = ReebGraph::new();
        for v in 0..3 {
            graph.declare_incidences(v, 1);
        }
        graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
        // the interior vertex is already gone before close
        assert_eq!(graph.number_of_nodes(), 2);
        assert_eq!(
            graph.stream_triangle(0, 0.0, 3, 3.0, 4, 4.0),
            Err(ReebError::VertexFinalized { vertex_id: 0 })
        );
    }

    #[test]
    fn deep_copy_leaves_original_streaming() {
        let mut graph = ReebGraph::new();
        graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();

        let mut snapshot = graph.deep_copy();
        snapshot.close_stream().unwrap();
        assert!(!snapshot.is_open());

        assert!(graph.is_open());
        assert!(graph.store.number_of_labels() > 0);
        graph.stream_triangle(1, 1.0, 2, 2.0, 3, 3.0).unwrap();
        assert!(graph.is_valid().is_ok());
    }
}
