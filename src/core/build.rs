//! Whole-mesh construction and graph import.
//!
//! The streaming core only ever sees `(vertex_id, scalar)` tuples packaged
//! into simplices; this module supplies the thin collaborators that feed it
//! from a mesh — a [`SimplicialMesh`] view, a [`ScalarField`] lookup and an
//! in-memory [`Mesh`] carrying named fields — plus the `build` entry points
//! with their stable integer error codes, and the trusted-import escape
//! hatch [`set_graph`](ReebGraph::set_graph).

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

use super::graph::{ReebError, ReebGraph};
use super::publish::DirectedGraph;
use super::store::{GraphStore, NodeKey, VertexId};

/// Scalar lookup per mesh vertex.
pub trait ScalarField {
    /// Number of tuples carried by the field.
    fn number_of_tuples(&self) -> usize;

    /// Value at a mesh vertex. Only called for vertices below
    /// [`number_of_tuples`](Self::number_of_tuples).
    fn value(&self, vertex: VertexId) -> f64;
}

impl ScalarField for [f64] {
    fn number_of_tuples(&self) -> usize {
        self.len()
    }

    fn value(&self, vertex: VertexId) -> f64 {
        self[usize::try_from(vertex).expect("vertex id exceeds the address space")]
    }
}

impl ScalarField for Vec<f64> {
    fn number_of_tuples(&self) -> usize {
        self.len()
    }

    fn value(&self, vertex: VertexId) -> f64 {
        self.as_slice().value(vertex)
    }
}

/// Cell-indexed view of a simplicial mesh.
///
/// A cell is a slice of 3 vertex ids (surface triangle) or 4 (volume
/// tetrahedron); anything else fails `build` with
/// [`BuildError::NotSimplicial`].
pub trait SimplicialMesh {
    /// Number of mesh vertices.
    fn number_of_vertices(&self) -> usize;

    /// Number of cells.
    fn number_of_cells(&self) -> usize;

    /// Vertex ids of one cell.
    fn cell(&self, index: usize) -> &[VertexId];
}

/// Access to named or indexed scalar fields attached to a mesh.
pub trait NamedFields {
    /// Field by attribute name.
    fn field_by_name(&self, name: &str) -> Option<&[f64]>;

    /// Field by attribute index.
    fn field_by_index(&self, index: usize) -> Option<&[f64]>;
}

/// In-memory simplicial mesh with named point-data fields; the minimal
/// stand-in for an external mesh object in tests, examples and demos.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    vertex_count: usize,
    cells: Vec<SmallVec<[VertexId; 4]>>,
    fields: Vec<(String, Vec<f64>)>,
}

impl Mesh {
    /// An empty mesh over `vertex_count` vertices.
    #[must_use]
    pub fn new(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            cells: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Appends a triangle.
    pub fn add_triangle(&mut self, v0: VertexId, v1: VertexId, v2: VertexId) -> &mut Self {
        self.cells.push(SmallVec::from_slice(&[v0, v1, v2]));
        self
    }

    /// Appends a tetrahedron.
    pub fn add_tetrahedron(
        &mut self,
        v0: VertexId,
        v1: VertexId,
        v2: VertexId,
        v3: VertexId,
    ) -> &mut Self {
        self.cells.push(SmallVec::from_slice(&[v0, v1, v2, v3]));
        self
    }

    /// Attaches a named point-data field.
    pub fn add_field(&mut self, name: impl Into<String>, values: Vec<f64>) -> &mut Self {
        self.fields.push((name.into(), values));
        self
    }
}

impl SimplicialMesh for Mesh {
    fn number_of_vertices(&self) -> usize {
        self.vertex_count
    }

    fn number_of_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, index: usize) -> &[VertexId] {
        &self.cells[index]
    }
}

impl NamedFields for Mesh {
    fn field_by_name(&self, name: &str) -> Option<&[f64]> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    fn field_by_index(&self, index: usize) -> Option<&[f64]> {
        self.fields.get(index).map(|(_, v)| v.as_slice())
    }
}

/// Failures of the whole-mesh `build` entry points.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BuildError {
    /// Field tuple count differs from the mesh vertex count.
    #[error("scalar field has {tuples} tuples but the mesh has {vertices} vertices")]
    IncorrectField {
        /// Tuples in the field.
        tuples: usize,
        /// Vertices in the mesh.
        vertices: usize,
    },
    /// The requested field does not exist.
    #[error("no scalar field selected by `{selector}`")]
    NoSuchField {
        /// Name or index that failed to resolve.
        selector: String,
    },
    /// A cell is not a triangle or tetrahedron, repeats a vertex, or
    /// references a vertex outside the mesh.
    #[error("cell {cell} with {arity} vertices is not a valid simplex of this mesh")]
    NotSimplicial {
        /// Index of the offending cell.
        cell: usize,
        /// Its vertex count.
        arity: usize,
    },
    /// The underlying stream rejected the build.
    #[error(transparent)]
    Stream(#[from] ReebError),
}

impl BuildError {
    /// Stable integer code: 0 is success, −1 incorrect field, −2 missing
    /// field, −3 non-simplicial mesh. Stream-state failures map to −4.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::IncorrectField { .. } => -1,
            Self::NoSuchField { .. } => -2,
            Self::NotSimplicial { .. } | Self::Stream(ReebError::NotSimplicial) => -3,
            Self::Stream(_) => -4,
        }
    }
}

/// Failures of [`ReebGraph::set_graph`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphImportError {
    /// An edge references a node id outside the graph.
    #[error("edge {index} references node {node} which does not exist")]
    DanglingEndpoint {
        /// Index of the offending edge.
        index: usize,
        /// The missing node id.
        node: usize,
    },
    /// An edge does not ascend in `(value, vertex_id)` order.
    #[error("edge {index} is not ascending in (value, vertex id) order")]
    NotMonotone {
        /// Index of the offending edge.
        index: usize,
    },
    /// Two nodes carry the same mesh vertex id.
    #[error("nodes {first} and {second} both carry mesh vertex {vertex_id}")]
    DuplicateVertexId {
        /// First node with the id.
        first: usize,
        /// Second node with the id.
        second: usize,
        /// The repeated mesh vertex id.
        vertex_id: VertexId,
    },
}

impl ReebGraph {
    /// Builds the Reeb graph of `field` over `mesh` in one call.
    ///
    /// Validates the inputs, declares per-vertex incidence counts so
    /// interior vertices finalize during the pass, streams every cell and
    /// closes the stream.
    ///
    /// # Errors
    ///
    /// See [`BuildError`]; [`BuildError::code`] yields the stable integer
    /// codes. On an input-validation error nothing has been streamed.
    pub fn build<M, F>(&mut self, mesh: &M, field: &F) -> Result<(), BuildError>
    where
        M: SimplicialMesh + ?Sized,
        F: ScalarField + ?Sized,
    {
        let vertices = mesh.number_of_vertices();
        if field.number_of_tuples() != vertices {
            return Err(BuildError::IncorrectField {
                tuples: field.number_of_tuples(),
                vertices,
            });
        }

        let mut incidences: FxHashMap<VertexId, u32> = FxHashMap::default();
        for index in 0..mesh.number_of_cells() {
            let cell = mesh.cell(index);
            let arity = cell.len();
            if arity != 3 && arity != 4 {
                return Err(BuildError::NotSimplicial { cell: index, arity });
            }
            for (i, &v) in cell.iter().enumerate() {
                let out_of_range = usize::try_from(v).map_or(true, |v| v >= vertices);
                if out_of_range || cell[i + 1..].contains(&v) {
                    return Err(BuildError::NotSimplicial { cell: index, arity });
                }
            }
            for &v in cell {
                *incidences.entry(v).or_insert(0) += 1;
            }
        }

        for (&v, &count) in &incidences {
            self.declare_incidences(v, count);
        }

        for index in 0..mesh.number_of_cells() {
            let cell = mesh.cell(index);
            match *cell {
                [v0, v1, v2] => {
                    self.stream_triangle(
                        v0,
                        field.value(v0),
                        v1,
                        field.value(v1),
                        v2,
                        field.value(v2),
                    )?;
                }
                [v0, v1, v2, v3] => {
                    self.stream_tetrahedron(
                        v0,
                        field.value(v0),
                        v1,
                        field.value(v1),
                        v2,
                        field.value(v2),
                        v3,
                        field.value(v3),
                    )?;
                }
                _ => unreachable!("cell arity was validated above"),
            }
        }
        self.close_stream()?;
        Ok(())
    }

    /// [`build`](Self::build) against the field registered under `name`.
    ///
    /// # Errors
    ///
    /// [`BuildError::NoSuchField`] when the name does not resolve, else as
    /// [`build`](Self::build).
    pub fn build_by_name<M>(&mut self, mesh: &M, name: &str) -> Result<(), BuildError>
    where
        M: SimplicialMesh + NamedFields + ?Sized,
    {
        let field = mesh.field_by_name(name).ok_or_else(|| BuildError::NoSuchField {
            selector: name.to_owned(),
        })?;
        self.build(mesh, field)
    }

    /// [`build`](Self::build) against the field registered at `index`.
    ///
    /// # Errors
    ///
    /// [`BuildError::NoSuchField`] when the index does not resolve, else as
    /// [`build`](Self::build).
    pub fn build_by_index<M>(&mut self, mesh: &M, index: usize) -> Result<(), BuildError>
    where
        M: SimplicialMesh + NamedFields + ?Sized,
    {
        let field = mesh.field_by_index(index).ok_or_else(|| BuildError::NoSuchField {
            selector: index.to_string(),
        })?;
        self.build(mesh, field)
    }

    /// Replaces the instance's contents with a pre-built graph, bypassing
    /// streaming.
    ///
    /// The import is validated (endpoint existence, edge monotonicity,
    /// vertex-id uniqueness) and then adopted wholesale: internal nodes are
    /// created finalized and critical, each edge becomes an arc whose sample
    /// bag carries the edge's interior vertices (values spaced strictly
    /// between the endpoint scalars, preserving their order), loops are
    /// re-detected and the graph republished. The stream is closed
    /// afterwards.
    ///
    /// # Errors
    ///
    /// See [`GraphImportError`]; on error the instance is unchanged.
    pub fn set_graph(&mut self, graph: &DirectedGraph) -> Result<(), GraphImportError> {
        let nodes = graph.nodes();
        for (index, edge) in graph.edges().iter().enumerate() {
            for endpoint in [edge.from, edge.to] {
                if endpoint >= nodes.len() {
                    return Err(GraphImportError::DanglingEndpoint {
                        index,
                        node: endpoint,
                    });
                }
            }
            let lo = &nodes[edge.from];
            let hi = &nodes[edge.to];
            let ascending = lo.value < hi.value
                || (lo.value == hi.value && lo.vertex_id < hi.vertex_id);
            if !ascending {
                return Err(GraphImportError::NotMonotone { index });
            }
        }
        let mut seen: FxHashMap<VertexId, usize> = FxHashMap::default();
        for (index, node) in nodes.iter().enumerate() {
            if let Some(&first) = seen.get(&node.vertex_id) {
                return Err(GraphImportError::DuplicateVertexId {
                    first,
                    second: index,
                    vertex_id: node.vertex_id,
                });
            }
            seen.insert(node.vertex_id, index);
        }

        let mut store = GraphStore::with_capacity(nodes.len().max(1));
        let mut keys: Vec<NodeKey> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let key = store.new_node(node.vertex_id, node.value);
            store.nodes[key].is_finalized = true;
            store.nodes[key].is_critical = true;
            keys.push(key);
        }
        for edge in graph.edges() {
            let arc = store.insert_arc(keys[edge.from], keys[edge.to]);
            let lo = nodes[edge.from].value;
            let hi = nodes[edge.to].value;
            let count = edge.interior.len();
            for (i, &vid) in edge.interior.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let t = (i + 1) as f64 / (count + 1) as f64;
                store.arcs[arc].samples.push((vid, lo + t * (hi - lo)));
            }
        }

        self.store = store;
        self.registry.clear();
        for (index, node) in nodes.iter().enumerate() {
            self.registry.record(node.vertex_id, keys[index]);
            self.registry.mark_finalized(node.vertex_id);
        }
        self.store.flush_labels();
        self.removed_loops = 0;
        self.history.clear();
        self.find_loops();
        self.mark_closed();
        self.publish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> Mesh {
        let mut mesh = Mesh::new(3);
        mesh.add_triangle(0, 1, 2)
            .add_field("height", vec![0.0, 1.0, 2.0]);
        mesh
    }

    #[test]
    fn build_streams_and_closes() {
        let mesh = triangle_mesh();
        let mut graph = ReebGraph::new();
        graph.build_by_name(&mesh, "height").unwrap();

        assert!(!graph.is_open());
        assert_eq!(graph.graph().number_of_nodes(), 2);
        assert_eq!(graph.graph().number_of_edges(), 1);
    }

    #[test]
    fn error_codes_are_stable() {
        let mut mesh = Mesh::new(3);
        mesh.add_triangle(0, 1, 2);
        mesh.add_field("height", vec![0.0, 1.0]);

        let mut graph = ReebGraph::new();
        let short_field = vec![0.0, 1.0];
        assert_eq!(
            graph.build(&mesh, &short_field).unwrap_err().code(),
            -1
        );
        assert_eq!(
            graph.build_by_name(&mesh, "missing").unwrap_err().code(),
            -2
        );

        let mut quad = Mesh::new(4);
        quad.cells.push(SmallVec::from_slice(&[0, 1, 2, 3]));
        quad.cells[0].push(0);
        let field = vec![0.0; 4];
        assert_eq!(graph.build(&quad, &field).unwrap_err().code(), -3);
    }

    #[test]
    fn out_of_range_vertex_is_not_simplicial() {
        let mut mesh = Mesh::new(2);
        mesh.add_triangle(0, 1, 5);
        let field = vec![0.0, 1.0];
        let mut graph = ReebGraph::new();
        assert_eq!(graph.build(&mesh, &field).unwrap_err().code(), -3);
    }

    #[test]
    fn set_graph_validates_and_adopts() {
        use crate::core::publish::GraphSink;

        let mut external = DirectedGraph::new();
        let a = external.add_node(0, 0.0);
        let b = external.add_node(9, 3.0);
        external.add_edge(a, b, &[4, 5]);

        let mut graph = ReebGraph::new();
        graph.set_graph(&external).unwrap();
        assert!(!graph.is_open());
        assert_eq!(graph.number_of_nodes(), 2);
        assert_eq!(graph.number_of_arcs(), 1);
        assert_eq!(graph.graph().edges()[0].interior, vec![4, 5]);
        assert!(graph.is_valid().is_ok());
    }

    #[test]
    fn set_graph_rejects_descending_edges() {
        use crate::core::publish::GraphSink;

        let mut external = DirectedGraph::new();
        let a = external.add_node(0, 2.0);
        let b = external.add_node(1, 1.0);
        external.add_edge(a, b, &[]);

        let mut graph = ReebGraph::new();
        assert_eq!(
            graph.set_graph(&external),
            Err(GraphImportError::NotMonotone { index: 0 })
        );
        assert!(graph.is_open());
    }
}
