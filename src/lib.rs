//! # reeb
//!
//! Streaming computation of the [Reeb graph](https://en.wikipedia.org/wiki/Reeb_graph)
//! of a piecewise-linear scalar field on a 2- or 3-dimensional simplicial
//! mesh, with multi-resolution simplification by topological persistence.
//!
//! The Reeb graph is a 1-complex summarizing how the connectivity of the
//! field's level sets evolves: its nodes are the critical points of the
//! field (minima, maxima, splits, joins) and its arcs are maximal intervals
//! along which level-set connectivity is constant.
//!
//! # Features
//!
//! - **Online construction** — triangles and tetrahedra are streamed one at
//!   a time and the graph is valid after every insertion, following the
//!   label-propagation ("zip") algorithm of Pascucci, Scorzelli, Bremer and
//!   Mascarenhas (*Robust on-line computation of Reeb graphs*, SIGGRAPH
//!   2007). Regular vertices are collapsed away as soon as their last
//!   incident simplex arrives, so memory tracks the critical structure
//!   rather than the mesh.
//! - **Loop detection** — one representative arc per independent cycle;
//!   for closed orientable PL 2-manifolds the loop count is the genus.
//! - **Persistence simplification** — branch retraction on the extremum
//!   pairing and loop cutting, driven by a threshold in `[0, 1]` of the
//!   scalar span or by a caller-supplied
//!   [`SimplificationMetric`](core::metric::SimplificationMetric).
//! - **Deterministic publication** — the surviving graph is re-emitted into
//!   a directed-graph sink with regular nodes suppressed and per-edge
//!   interior vertex lists, identically for any streaming order of the same
//!   mesh.
//!
//! # Streaming
//!
//! ```rust
//! use reeb::prelude::*;
//!
//! let mut graph = ReebGraph::new();
//! graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
//! graph.stream_triangle(1, 1.0, 2, 2.0, 3, 3.0).unwrap();
//! graph.close_stream().unwrap();
//!
//! assert_eq!(graph.number_of_loops(), 0);
//! let published = graph.graph();
//! assert_eq!(published.number_of_nodes(), 2); // global min and max survive
//! assert_eq!(published.edges()[0].interior, vec![1, 2]);
//! ```
//!
//! To snapshot an intermediate result without ending the stream, close a
//! [`deep_copy`](core::graph::ReebGraph::deep_copy) and keep streaming into
//! the original.
//!
//! # Whole meshes and simplification
//!
//! ```rust
//! use reeb::prelude::*;
//!
//! let mut mesh = Mesh::new(4);
//! mesh.add_triangle(0, 1, 2)
//!     .add_triangle(1, 3, 2)
//!     .add_field("height", vec![0.0, 1.0, 1.0, 2.0]);
//!
//! let mut graph = ReebGraph::new();
//! graph.build_by_name(&mesh, "height").unwrap();
//! assert_eq!(graph.graph().number_of_edges(), 1);
//!
//! // nothing below 10% of the span here, so this is a no-op
//! let removed = graph.simplify(0.1, None).unwrap();
//! assert_eq!(removed, 0);
//! ```
//!
//! # Invariants
//!
//! Every public operation leaves the instance satisfying the structural
//! invariants checked by [`ReebGraph::is_valid`](core::graph::ReebGraph::is_valid):
//! arcs ascend strictly in `(value, vertex id)` order, the intrusive arc
//! lists are well formed, label chains are consistent and monotone, and all
//! node values lie in the recorded scalar range. State-misuse errors
//! ([`ReebError`](core::graph::ReebError)) are detected before any mutation,
//! so a failed call changes nothing.
//!
//! A `ReebGraph` is single-threaded by design; ids obtained from one
//! instance are meaningful only within that instance and only until the
//! next mutating call.

#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// Core data structures and algorithms: pooled storage, label tracks, the
/// streaming builder, loop detection, simplification and publication.
pub mod core {
    /// Whole-mesh construction, mesh/field collaborators, graph import.
    pub mod build;
    /// The Reeb-graph instance and streaming entry points.
    pub mod graph;
    /// Label track maintenance (horizontal and vertical chains).
    pub mod labels;
    /// Loop enumeration via a union-find pass.
    pub mod loops;
    /// Pluggable simplification importance measure.
    pub mod metric;
    /// Publication into a directed-graph sink.
    pub mod publish;
    /// Mesh-vertex registry and open-simplex accounting.
    pub mod registry;
    /// Persistence-driven simplification.
    pub mod simplify;
    /// Pooled node/arc/label storage and structural mutators.
    pub mod store;

    pub use build::*;
    pub use graph::*;
    pub use metric::*;
    pub use publish::*;
    pub use registry::*;
    pub use store::*;
}

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::core::build::{
        BuildError, GraphImportError, Mesh, NamedFields, ScalarField, SimplicialMesh,
    };
    pub use crate::core::graph::{
        Cancellation, ReebError, ReebGraph, ReebSettings, ReebSettingsBuilder,
        ReebValidationError,
    };
    pub use crate::core::metric::SimplificationMetric;
    pub use crate::core::publish::{DirectedGraph, GraphEdge, GraphNode, GraphSink};
    pub use crate::core::store::{ArcKey, LabelKey, LabelTag, NodeKey, VertexId};
}
