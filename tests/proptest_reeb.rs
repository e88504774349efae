//! Property tests: structural invariants under arbitrary triangle soups,
//! including scalar ties, shared edges and non-manifold junctions.

use proptest::prelude::*;
use reeb::prelude::*;

#[derive(Clone, Debug)]
struct Soup {
    scalars: Vec<f64>,
    triangles: Vec<[u64; 3]>,
}

fn soup() -> impl Strategy<Value = Soup> {
    (3usize..8)
        .prop_flat_map(|vertex_count| {
            let scalars = prop::collection::vec(0u8..8, vertex_count)
                .prop_map(|raw| raw.into_iter().map(|v| f64::from(v) * 0.5).collect::<Vec<_>>());
            let triangle = prop::collection::vec(0..vertex_count as u64, 3)
                .prop_filter_map("degenerate triangle", |v| {
                    (v[0] != v[1] && v[1] != v[2] && v[0] != v[2]).then(|| [v[0], v[1], v[2]])
                });
            let triangles = prop::collection::vec(triangle, 1..12);
            (scalars, triangles)
        })
        .prop_map(|(scalars, triangles)| Soup { scalars, triangles })
}

fn stream(soup: &Soup, order: impl Iterator<Item = usize>) -> ReebGraph {
    let mut graph = ReebGraph::new();
    for index in order {
        let [a, b, c] = soup.triangles[index];
        graph
            .stream_triangle(
                a,
                soup.scalars[a as usize],
                b,
                soup.scalars[b as usize],
                c,
                soup.scalars[c as usize],
            )
            .unwrap();
    }
    graph.close_stream().unwrap();
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn invariants_hold_after_every_insertion(soup in soup()) {
        let mut graph = ReebGraph::new();
        for &[a, b, c] in &soup.triangles {
            graph
                .stream_triangle(
                    a,
                    soup.scalars[a as usize],
                    b,
                    soup.scalars[b as usize],
                    c,
                    soup.scalars[c as usize],
                )
                .unwrap();
            prop_assert!(graph.is_valid().is_ok());
        }
        graph.close_stream().unwrap();
        prop_assert!(graph.is_valid().is_ok());
    }

    #[test]
    fn loop_count_matches_published_cycle_rank(soup in soup()) {
        let graph = stream(&soup, 0..soup.triangles.len());
        prop_assert_eq!(graph.graph().cycle_rank(), graph.number_of_loops());
    }

    #[test]
    fn restreaming_is_idempotent(soup in soup()) {
        let once = stream(&soup, 0..soup.triangles.len());
        let twice = stream(
            &soup,
            (0..soup.triangles.len()).chain(0..soup.triangles.len()),
        );
        prop_assert_eq!(once.graph(), twice.graph());
        prop_assert_eq!(once.number_of_loops(), twice.number_of_loops());
    }

    #[test]
    fn published_graph_ignores_stream_order(soup in soup()) {
        let forward = stream(&soup, 0..soup.triangles.len());
        let backward = stream(&soup, (0..soup.triangles.len()).rev());
        prop_assert_eq!(forward.graph(), backward.graph());
        prop_assert_eq!(forward.number_of_loops(), backward.number_of_loops());
        prop_assert_eq!(
            forward.number_of_connected_components(),
            backward.number_of_connected_components()
        );
    }

    #[test]
    fn simplification_keeps_the_graph_valid(soup in soup(), threshold in 0.0f64..=1.0) {
        let mut graph = stream(&soup, 0..soup.triangles.len());
        graph.simplify(threshold, None).unwrap();
        prop_assert!(graph.is_valid().is_ok());

        // a second identical pass finds nothing left to remove
        let again = graph.simplify(threshold, None).unwrap();
        prop_assert_eq!(again, 0);
    }
}
