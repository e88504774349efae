//! Persistence-driven simplification.
//!
//! Two passes share the arc-importance measure (normalized scalar span by
//! default, a [`SimplificationMetric`] when supplied):
//!
//! - **Branches.** Every leaf extremum proposes the cheapest monotone
//!   retraction path to its pairing saddle — descending from a maximum
//!   through split saddles until a node where a second upward branch joins,
//!   dually for minima. The pairing obeys the elder rule: a branch of the
//!   saddle must outlive the extremum, so global extrema are essential and
//!   never retracted. The globally best proposal at or below the threshold
//!   is retracted, and the search repeats until none qualifies.
//! - **Loops.** Each representative arc in the loop table that still closes
//!   a cycle and sits at or below the threshold is cut.
//!
//! Both passes collapse nodes left at degree (1,1) as they go, and
//! [`commit_simplification`](ReebGraph::commit_simplification) finishes with
//! a whole-graph elision sweep and a fresh publication.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::debug;

use super::graph::{Cancellation, ReebError, ReebGraph};
use super::metric::SimplificationMetric;
use super::store::{ArcKey, NodeKey, VertexId};

/// A candidate retraction: the monotone path from a leaf extremum to its
/// pairing saddle.
#[derive(Clone, Debug)]
struct ReebPath {
    /// Accumulated persistence of the path's arcs.
    persistence: f64,
    /// Arcs from the extremum toward the saddle.
    arcs: SmallVec<[ArcKey; 8]>,
    /// Mesh vertex of the path's scalar-highest node: the maximum itself
    /// for a downward retraction, the pairing saddle for an upward one.
    upper_vertex: VertexId,
    /// Mesh vertex of the extremum.
    extremum_vertex: VertexId,
}

impl ReebPath {
    /// Deterministic order: lower persistence first, then fewer arcs, then
    /// the smaller vertex id of the path's highest node. Two upward paths
    /// can share their highest node (one saddle joining two minima at equal
    /// persistence), so the extremum's vertex id settles what remains.
    fn beats(&self, other: &Self) -> bool {
        let lhs = (
            OrderedFloat(self.persistence),
            self.arcs.len(),
            self.upper_vertex,
            self.extremum_vertex,
        );
        let rhs = (
            OrderedFloat(other.persistence),
            other.arcs.len(),
            other.upper_vertex,
            other.extremum_vertex,
        );
        lhs < rhs
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Walk {
    /// From a maximum toward the join below it.
    Down,
    /// From a minimum toward the split above it.
    Up,
}

/// Frontier entry of the best-first path search.
#[derive(Clone, Debug)]
struct SearchState {
    cost: OrderedFloat<f64>,
    hops: usize,
    node: NodeKey,
    arcs: SmallVec<[ArcKey; 8]>,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so the BinaryHeap pops the cheapest frontier first
        (other.cost, other.hops, other.node).cmp(&(self.cost, self.hops, self.node))
    }
}

impl ReebGraph {
    /// Removes every feature whose persistence stays at or below
    /// `threshold`, a fraction of the scalar span in `[0, 1]`.
    ///
    /// Runs branch retraction, then loop cutting, then branch retraction
    /// again (cut loops can expose new leaves), commits the degree-2 sweep
    /// and republishes. Returns the number of removed arcs. Passing a
    /// metric replaces normalized persistence as the importance measure.
    ///
    /// # Errors
    ///
    /// [`ReebError::StreamOpen`] before `close_stream`,
    /// [`ReebError::InvalidThreshold`] for a threshold outside `[0, 1]`.
    pub fn simplify(
        &mut self,
        threshold: f64,
        metric: Option<&dyn SimplificationMetric>,
    ) -> Result<usize, ReebError> {
        self.ensure_closed()?;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ReebError::InvalidThreshold { given: threshold });
        }
        self.history.clear();
        let mut removed = self.simplify_branches(threshold, metric);
        removed += self.simplify_loops(threshold, metric);
        removed += self.simplify_branches(threshold, metric);
        self.commit_simplification();
        debug!(removed, threshold, "simplification pass complete");
        Ok(removed)
    }

    /// Importance of an arc under the active measure.
    pub(crate) fn arc_persistence(
        &self,
        a: ArcKey,
        metric: Option<&dyn SimplificationMetric>,
    ) -> f64 {
        let arc = &self.store.arcs[a];
        let lower = self.store.nodes[arc.n0].value;
        let upper = self.store.nodes[arc.n1].value;
        match metric {
            Some(m) => {
                let mut interior: Vec<(OrderedFloat<f64>, VertexId)> = arc
                    .samples
                    .iter()
                    .map(|&(vid, value)| (OrderedFloat(value), vid))
                    .collect();
                interior.sort_unstable();
                let ids: Vec<VertexId> = interior.into_iter().map(|(_, vid)| vid).collect();
                m.compute(lower, upper, &ids)
            }
            None => {
                let span = self.store.scalar_span();
                if span > 0.0 {
                    (upper - lower) / span
                } else {
                    0.0
                }
            }
        }
    }

    fn simplify_branches(
        &mut self,
        threshold: f64,
        metric: Option<&dyn SimplificationMetric>,
    ) -> usize {
        let mut removed = 0;
        loop {
            let mut best: Option<ReebPath> = None;
            let leaves: Vec<(NodeKey, Walk)> = self
                .store
                .nodes
                .keys()
                .filter_map(|n| {
                    let down = self.store.down_degree(n);
                    let up = self.store.up_degree(n);
                    if up == 0 && down == 1 {
                        Some((n, Walk::Down))
                    } else if down == 0 && up == 1 {
                        Some((n, Walk::Up))
                    } else {
                        None
                    }
                })
                .collect();
            for (leaf, walk) in leaves {
                if let Some(path) = self.find_retraction(leaf, walk, threshold, metric) {
                    if best.as_ref().is_none_or(|b| path.beats(b)) {
                        best = Some(path);
                    }
                }
            }
            let Some(path) = best else { break };
            removed += path.arcs.len();
            self.fast_arc_simplify(&path.arcs);
        }
        removed
    }

    /// Cheapest monotone path from a leaf extremum to a pairing saddle
    /// satisfying the elder rule, restricted to total cost ≤ `threshold`.
    ///
    /// Retracting the path deletes the leaf, may demote saddles on it to
    /// new, smaller extrema, and never disconnects the graph: every other
    /// branch hanging off the path stays attached through the pairing
    /// saddle's surviving side.
    fn find_retraction(
        &self,
        extremum: NodeKey,
        walk: Walk,
        threshold: f64,
        metric: Option<&dyn SimplificationMetric>,
    ) -> Option<ReebPath> {
        let extremum_vertex = self.store.nodes[extremum].vertex_id;
        let mut frontier: BinaryHeap<SearchState> = BinaryHeap::new();
        let mut settled: FxHashSet<NodeKey> = FxHashSet::default();

        let seed = match walk {
            Walk::Down => self.store.down_arcs(extremum).next()?,
            Walk::Up => self.store.up_arcs(extremum).next()?,
        };
        let seed_cost = self.arc_persistence(seed, metric);
        if seed_cost > threshold {
            return None;
        }
        let seed_node = match walk {
            Walk::Down => self.store.arcs[seed].n0,
            Walk::Up => self.store.arcs[seed].n1,
        };
        frontier.push(SearchState {
            cost: OrderedFloat(seed_cost),
            hops: 1,
            node: seed_node,
            arcs: SmallVec::from_slice(&[seed]),
        });

        while let Some(state) = frontier.pop() {
            if !settled.insert(state.node) {
                continue;
            }
            let joining = match walk {
                Walk::Down => self.store.up_degree(state.node),
                Walk::Up => self.store.down_degree(state.node),
            };
            if joining >= 2 {
                let Some(&last_arc) = state.arcs.last() else {
                    continue;
                };
                if self.elder_branch_exists(extremum, state.node, last_arc, walk) {
                    let upper_vertex = match walk {
                        Walk::Down => extremum_vertex,
                        Walk::Up => self.store.nodes[state.node].vertex_id,
                    };
                    return Some(ReebPath {
                        persistence: state.cost.into_inner(),
                        arcs: state.arcs,
                        upper_vertex,
                        extremum_vertex,
                    });
                }
                // searches never continue past a join; later rounds retry
                // once the younger features there have cancelled
                continue;
            }
            let continuations: SmallVec<[ArcKey; 4]> = match walk {
                Walk::Down => self.store.down_arcs(state.node).collect(),
                Walk::Up => self.store.up_arcs(state.node).collect(),
            };
            for arc in continuations {
                let cost = state.cost.into_inner() + self.arc_persistence(arc, metric);
                if cost > threshold {
                    continue;
                }
                let next = match walk {
                    Walk::Down => self.store.arcs[arc].n0,
                    Walk::Up => self.store.arcs[arc].n1,
                };
                if settled.contains(&next) {
                    continue;
                }
                let mut arcs = state.arcs.clone();
                arcs.push(arc);
                frontier.push(SearchState {
                    cost: OrderedFloat(cost),
                    hops: state.hops + 1,
                    node: next,
                    arcs,
                });
            }
        }
        None
    }

    /// Elder rule: the extremum may only die at `saddle` if another branch
    /// there outlives it — descending (for a minimum) to a strictly lower
    /// node, or ascending (for a maximum) to a strictly higher one, without
    /// using the retraction path's final arc. Without this check a search
    /// could walk around a loop and cancel a global extremum.
    fn elder_branch_exists(
        &self,
        extremum: NodeKey,
        saddle: NodeKey,
        path_arc: ArcKey,
        walk: Walk,
    ) -> bool {
        let mut stack: SmallVec<[NodeKey; 8]> = SmallVec::from_slice(&[saddle]);
        let mut seen: FxHashSet<NodeKey> = FxHashSet::default();
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            let survives = match walk {
                Walk::Up => self.store.less(n, extremum),
                Walk::Down => self.store.less(extremum, n),
            };
            if survives {
                return true;
            }
            let continuations: SmallVec<[ArcKey; 4]> = match walk {
                Walk::Up => self.store.down_arcs(n).collect(),
                Walk::Down => self.store.up_arcs(n).collect(),
            };
            for arc in continuations {
                if n == saddle && arc == path_arc {
                    continue;
                }
                let next = match walk {
                    Walk::Up => self.store.arcs[arc].n0,
                    Walk::Down => self.store.arcs[arc].n1,
                };
                stack.push(next);
            }
        }
        false
    }

    /// True when `a` still closes a cycle: its endpoints stay connected
    /// without it. Loop-table entries can go stale when a branch retraction
    /// tears through one side of their cycle.
    fn arc_on_cycle(&self, a: ArcKey) -> bool {
        let (from, to) = {
            let arc = &self.store.arcs[a];
            (arc.n0, arc.n1)
        };
        let mut stack: SmallVec<[NodeKey; 8]> = SmallVec::from_slice(&[from]);
        let mut seen: FxHashSet<NodeKey> = FxHashSet::default();
        while let Some(n) = stack.pop() {
            if n == to {
                return true;
            }
            if !seen.insert(n) {
                continue;
            }
            for arc in self.store.up_arcs(n).chain(self.store.down_arcs(n)) {
                if arc == a {
                    continue;
                }
                let other = {
                    let record = &self.store.arcs[arc];
                    if record.n0 == n {
                        record.n1
                    } else {
                        record.n0
                    }
                };
                stack.push(other);
            }
        }
        false
    }

    /// Detaches and deletes every arc of a retraction path, deletes nodes
    /// left isolated and collapses nodes left regular.
    pub(crate) fn fast_arc_simplify(&mut self, arcs: &[ArcKey]) {
        let mut cancellation = Cancellation::default();
        let mut touched: SmallVec<[NodeKey; 8]> = SmallVec::new();
        for &a in arcs {
            let (n0, n1) = {
                let arc = &self.store.arcs[a];
                (arc.n0, arc.n1)
            };
            if self.history_on {
                cancellation.removed_arcs.push((
                    self.store.nodes[n0].vertex_id,
                    self.store.nodes[n1].vertex_id,
                ));
            }
            touched.push(n0);
            touched.push(n1);
            self.store.remove_up_arc(a);
            self.store.remove_down_arc(a);
            self.store.arcs.remove(a);
        }
        for n in touched {
            self.cleanup_node(n, &mut cancellation);
        }
        if self.history_on {
            self.history.push(cancellation);
        }
    }

    fn simplify_loops(
        &mut self,
        threshold: f64,
        metric: Option<&dyn SimplificationMetric>,
    ) -> usize {
        let table = std::mem::take(&mut self.loop_arcs);
        let mut kept = Vec::with_capacity(table.len());
        let mut removed = 0;
        for a in table {
            if !self.store.contains_arc(a) || !self.arc_on_cycle(a) {
                // consumed, or its cycle was already torn open elsewhere
                continue;
            }
            if self.arc_persistence(a, metric) > threshold {
                kept.push(a);
                continue;
            }
            let mut cancellation = Cancellation::default();
            let (n0, n1) = {
                let arc = &self.store.arcs[a];
                (arc.n0, arc.n1)
            };
            if self.history_on {
                cancellation.removed_arcs.push((
                    self.store.nodes[n0].vertex_id,
                    self.store.nodes[n1].vertex_id,
                ));
            }
            self.store.remove_up_arc(a);
            self.store.remove_down_arc(a);
            self.store.arcs.remove(a);
            self.cleanup_node(n0, &mut cancellation);
            self.cleanup_node(n1, &mut cancellation);
            if self.history_on {
                self.history.push(cancellation);
            }
            removed += 1;
            self.removed_loops += 1;
        }
        self.loop_arcs = kept;
        removed
    }

    /// Whole-graph degree-2 sweep followed by republication.
    pub(crate) fn commit_simplification(&mut self) {
        let nodes: Vec<NodeKey> = self.store.nodes.keys().collect();
        for n in nodes {
            self.try_elide(n);
        }
        self.publish();
    }

    fn cleanup_node(&mut self, n: NodeKey, cancellation: &mut Cancellation) {
        if !self.store.contains_node(n) {
            return;
        }
        let isolated =
            self.store.nodes[n].arc_down.is_none() && self.store.nodes[n].arc_up.is_none();
        if isolated {
            self.store.nodes.remove(n);
            return;
        }
        if let Some(spliced) = self.try_elide(n) {
            if self.history_on {
                let arc = &self.store.arcs[spliced];
                cancellation.inserted_arcs.push((
                    self.store.nodes[arc.n0].vertex_id,
                    self.store.nodes[arc.n1].vertex_id,
                ));
            }
        }
    }
}
