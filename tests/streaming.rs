//! End-to-end streaming scenarios: canonical small meshes, boundary
//! behaviors and stream-order invariance of the published graph.

use reeb::prelude::*;

/// Height-like field on the 3×3 toroidal grid: 9 vertices, 18 triangles,
/// a genus-1 closed surface.
fn torus_3x3() -> Vec<(u64, u64, u64)> {
    let v = |i: u64, j: u64| (i % 3) * 3 + (j % 3);
    let mut triangles = Vec::new();
    for i in 0..3 {
        for j in 0..3 {
            let (a, b, c, d) = (v(i, j), v(i + 1, j), v(i, j + 1), v(i + 1, j + 1));
            triangles.push((a, b, c));
            triangles.push((b, d, c));
        }
    }
    triangles
}

/// Square annulus: outer corners 0–3, inner hole corners 4–7, 8 triangles.
/// The hole spans scalar 4.0 (bottom saddle) to 5.0 (top saddle) within a
/// total span of 10.
fn annulus() -> (Vec<(u64, u64, u64)>, Vec<f64>) {
    let triangles = vec![
        (0, 1, 4),
        (1, 5, 4),
        (1, 2, 5),
        (2, 6, 5),
        (2, 3, 6),
        (3, 7, 6),
        (3, 0, 7),
        (0, 4, 7),
    ];
    let scalars = vec![0.0, 4.2, 10.0, 4.3, 4.0, 4.6, 5.0, 4.7];
    (triangles, scalars)
}

fn stream_all(triangles: &[(u64, u64, u64)], scalars: &[f64]) -> ReebGraph {
    let mut graph = ReebGraph::new();
    for &(a, b, c) in triangles {
        graph
            .stream_triangle(
                a,
                scalars[a as usize],
                b,
                scalars[b as usize],
                c,
                scalars[c as usize],
            )
            .unwrap();
        graph.is_valid().unwrap();
    }
    graph.close_stream().unwrap();
    graph.is_valid().unwrap();
    graph
}

#[test]
fn empty_stream_publishes_an_empty_graph() {
    let mut graph = ReebGraph::new();
    graph.close_stream().unwrap();

    assert_eq!(graph.number_of_nodes(), 0);
    assert_eq!(graph.number_of_arcs(), 0);
    assert_eq!(graph.number_of_loops(), 0);
    assert_eq!(graph.number_of_connected_components(), 0);
    assert_eq!(graph.graph().number_of_nodes(), 0);
    assert_eq!(graph.graph().number_of_edges(), 0);
}

#[test]
fn single_triangle_publishes_min_to_max() {
    let graph = stream_all(&[(0, 1, 2)], &[0.0, 1.0, 2.0]);

    assert_eq!(graph.number_of_loops(), 0);
    let published = graph.graph();
    assert_eq!(published.number_of_nodes(), 2);
    assert_eq!(published.nodes()[0].vertex_id, 0);
    assert_eq!(published.nodes()[1].vertex_id, 2);
    assert_eq!(published.number_of_edges(), 1);
    assert_eq!(published.edges()[0].from, 0);
    assert_eq!(published.edges()[0].to, 1);
    assert_eq!(published.edges()[0].interior, vec![1]);
}

#[test]
fn two_triangles_sharing_an_edge_form_a_monotone_path() {
    // a disk is simply connected, so its Reeb graph is loop-free however
    // the shared-edge scalars tie
    let graph = stream_all(&[(0, 1, 2), (1, 3, 2)], &[0.0, 1.0, 1.0, 2.0]);

    assert_eq!(graph.number_of_loops(), 0);
    assert_eq!(graph.number_of_connected_components(), 1);
    let published = graph.graph();
    assert_eq!(published.number_of_nodes(), 2);
    assert_eq!(published.number_of_edges(), 1);
    assert_eq!(published.edges()[0].interior, vec![1, 2]);
}

#[test]
fn single_tetrahedron_collapses_to_a_line() {
    let mut graph = ReebGraph::new();
    graph
        .stream_tetrahedron(0, 0.0, 1, 1.0, 2, 2.0, 3, 3.0)
        .unwrap();
    graph.is_valid().unwrap();
    graph.close_stream().unwrap();

    assert_eq!(graph.number_of_loops(), 0);
    assert_eq!(graph.number_of_nodes(), 2);
    assert_eq!(graph.number_of_arcs(), 1);
    let published = graph.graph();
    assert_eq!(published.number_of_edges(), 1);
    assert_eq!(published.edges()[0].interior, vec![1, 2]);
}

#[test]
fn annulus_has_one_loop() {
    let (triangles, scalars) = annulus();
    let graph = stream_all(&triangles, &scalars);

    assert_eq!(graph.number_of_loops(), 1);
    assert_eq!(graph.number_of_connected_components(), 1);
    // split saddle at the hole bottom, join saddle at the hole top
    assert_eq!(graph.graph().number_of_nodes(), 4);
    assert_eq!(graph.graph().cycle_rank(), 1);
}

#[test]
fn torus_loop_count_equals_genus() {
    let triangles = torus_3x3();
    let scalars: Vec<f64> = (0..9).map(f64::from).collect();
    let graph = stream_all(&triangles, &scalars);

    assert_eq!(graph.number_of_connected_components(), 1);
    assert_eq!(graph.number_of_loops(), 1);
    assert_eq!(graph.graph().cycle_rank(), 1);
}

#[test]
fn restreaming_a_simplex_changes_nothing() {
    let mut once = ReebGraph::new();
    let mut twice = ReebGraph::new();
    for graph in [&mut once, &mut twice] {
        graph.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
    }
    twice.stream_triangle(0, 0.0, 1, 1.0, 2, 2.0).unwrap();
    twice.is_valid().unwrap();

    once.close_stream().unwrap();
    twice.close_stream().unwrap();
    assert_eq!(once.graph(), twice.graph());
    assert_eq!(once.number_of_arcs(), twice.number_of_arcs());
}

#[test]
fn published_graph_is_invariant_under_stream_order() {
    let (triangles, scalars) = annulus();
    let reference = stream_all(&triangles, &scalars);

    // a few deterministic shuffles
    for step in [3usize, 5, 7] {
        let mut permuted = Vec::new();
        let mut index = 0;
        for _ in 0..triangles.len() {
            index = (index + step) % triangles.len();
            permuted.push(triangles[index]);
        }
        let graph = stream_all(&permuted, &scalars);
        assert_eq!(graph.graph(), reference.graph(), "step {step}");
        assert_eq!(graph.number_of_loops(), reference.number_of_loops());
    }
}

#[test]
fn tetrahedron_face_order_does_not_matter() {
    // the same tet streamed under every vertex permutation publishes the
    // same graph
    let perms = [
        [0u64, 1, 2, 3],
        [3, 2, 1, 0],
        [1, 3, 0, 2],
        [2, 0, 3, 1],
    ];
    let scalars = [0.0, 1.0, 2.0, 3.0];
    let mut published = Vec::new();
    for p in perms {
        let mut graph = ReebGraph::new();
        graph
            .stream_tetrahedron(
                p[0],
                scalars[p[0] as usize],
                p[1],
                scalars[p[1] as usize],
                p[2],
                scalars[p[2] as usize],
                p[3],
                scalars[p[3] as usize],
            )
            .unwrap();
        graph.close_stream().unwrap();
        published.push(graph.graph().clone());
    }
    for later in &published[1..] {
        assert_eq!(&published[0], later);
    }
}

#[test]
fn two_components_are_counted() {
    let graph = stream_all(
        &[(0, 1, 2), (3, 4, 5)],
        &[0.0, 1.0, 2.0, 5.0, 6.0, 7.0],
    );
    assert_eq!(graph.number_of_connected_components(), 2);
    assert_eq!(graph.number_of_loops(), 0);
    assert_eq!(graph.graph().number_of_nodes(), 4);
    assert_eq!(graph.graph().number_of_edges(), 2);
}

#[test]
fn build_matches_streaming() {
    let (triangles, scalars) = annulus();
    let streamed = stream_all(&triangles, &scalars);

    let mut mesh = Mesh::new(8);
    for &(a, b, c) in &triangles {
        mesh.add_triangle(a, b, c);
    }
    mesh.add_field("height", scalars);
    let mut built = ReebGraph::new();
    built.build_by_name(&mesh, "height").unwrap();

    assert_eq!(built.graph(), streamed.graph());
    assert_eq!(built.number_of_loops(), streamed.number_of_loops());
}
