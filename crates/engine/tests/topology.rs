//! Topology tests: identifiers, layout validation, generation, and
//! structural validation. Everything here is pure and seed-driven.

use labyrinth_engine::graph::cycles::{find_loop_from, has_cycle, walk};
use labyrinth_engine::graph::generator::{GenerationRequest, GraphGenerator, MIN_HUB_LOOP};
use labyrinth_engine::graph::validator::{ValidationError, validate};
use labyrinth_engine::graph::{self, Direction, Edge, GraphNode, NodeRole};
use labyrinth_engine::layout::{BspLayout, FloodFillLayout, GraphLayout, GridLayout, LayoutError};
use labyrinth_engine::world::ChunkLevel;
use labyrinth_engine::world::id::{self, ORPHAN, WORLD_ROOT};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CHUNK: &str = "SUBZONE_ZONE_REGION_WORLD_root_0a0a0a0a_1b1b1b1b_2c2c2c2c";

fn grid(width: u32, height: u32, loop_frequency: f64) -> GraphLayout {
    GraphLayout::grid(width, height, loop_frequency).unwrap()
}

fn all_layouts() -> Vec<GraphLayout> {
    vec![
        grid(5, 5, 0.3),
        grid(1, 7, 1.0),
        grid(10, 10, 0.0),
        GraphLayout::bsp(2, 6).unwrap(),
        GraphLayout::bsp(4, 3).unwrap(),
        GraphLayout::flood_fill(5, 0.1).unwrap(),
        GraphLayout::flood_fill(100, 1.0).unwrap(),
    ]
}

fn hub_of(nodes: &[GraphNode]) -> &GraphNode {
    graph::hub(nodes).expect("generated graphs always have a hub")
}

/// Copy of `nodes` keeping only visible edges.
fn visible_only(nodes: &[GraphNode]) -> Vec<GraphNode> {
    nodes
        .iter()
        .map(|n| GraphNode {
            edges: n.visible_edges().cloned().collect(),
            ..n.clone()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[test]
fn world_id_is_fixed() {
    assert_eq!(id::generate(ChunkLevel::World, None), WORLD_ROOT);
    assert_eq!(id::generate(ChunkLevel::World, Some("ignored")), WORLD_ROOT);
    assert_eq!(id::parse(WORLD_ROOT), Some(ChunkLevel::World));
    assert_eq!(id::extract_parent_id(WORLD_ROOT), None);
}

#[test]
fn space_id_has_level_parent_and_hex_suffix() {
    let generated = id::generate(ChunkLevel::Space, Some("p1"));
    let suffix = generated.strip_prefix("SPACE_p1_").expect("prefix");
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn missing_parent_is_encoded_as_orphan() {
    let generated = id::generate(ChunkLevel::Zone, None);
    assert!(generated.starts_with("ZONE_orphan_"));
    assert_eq!(id::extract_parent_id(&generated).as_deref(), Some(ORPHAN));
}

#[test]
fn parent_chain_round_trips_through_every_level() {
    let mut parent = id::generate(ChunkLevel::World, None);
    for level in [ChunkLevel::Region, ChunkLevel::Zone, ChunkLevel::Subzone, ChunkLevel::Space] {
        let child = id::generate(level, Some(&parent));
        assert_eq!(id::parse(&child), Some(level));
        assert_eq!(id::extract_parent_id(&child), Some(parent.clone()));
        parent = child;
    }
}

#[test]
fn malformed_ids_are_not_errors() {
    assert_eq!(id::parse(""), None);
    assert_eq!(id::parse("garbage"), None);
    assert_eq!(id::parse("CASTLE_x_12345678"), None);
    assert_eq!(id::extract_parent_id("SPACE_x"), None);
    assert_eq!(id::extract_parent_id("nonsense"), None);
}

// ---------------------------------------------------------------------------
// Layout validation
// ---------------------------------------------------------------------------

#[test]
fn grid_node_count_is_width_times_height() {
    for width in 1..=100u32 {
        for height in 1..=(100 / width) {
            let layout = GridLayout::new(width, height, 0.0).unwrap();
            assert_eq!(layout.node_count(), width * height);
        }
    }
}

#[test]
fn grid_rejects_bad_parameters() {
    assert!(matches!(GridLayout::new(0, 5, 0.5), Err(LayoutError::InvalidDimensions { .. })));
    assert!(matches!(GridLayout::new(5, 0, 0.5), Err(LayoutError::InvalidDimensions { .. })));
    assert_eq!(GridLayout::new(11, 10, 0.5), Err(LayoutError::TooManyNodes { count: 110 }));
    assert!(GridLayout::new(10, 10, 0.5).is_ok());
    assert!(GridLayout::new(5, 5, 1.5).is_err());
    assert!(GridLayout::new(5, 5, -0.1).is_err());
    assert!(GridLayout::new(5, 5, f64::NAN).is_err());
}

#[test]
fn short_lines_reject_loops() {
    for (width, height) in [(1, 1), (1, 2), (1, 3), (3, 1)] {
        assert_eq!(
            GridLayout::new(width, height, 1.0),
            Err(LayoutError::NoRoomForLoops { width, height })
        );
        assert!(GridLayout::new(width, height, 0.0).is_ok());
    }
    assert!(GridLayout::new(1, 4, 1.0).is_ok());
    assert!(GridLayout::new(2, 2, 1.0).is_ok());

    let parsed = serde_json::from_str::<GraphLayout>(r#"{ "kind": "grid", "width": 1, "height": 2 }"#);
    assert!(parsed.is_err());
}

#[test]
fn bsp_rejects_bad_parameters() {
    assert_eq!(BspLayout::new(1, 3), Err(LayoutError::RoomTooSmall(1)));
    assert_eq!(BspLayout::new(2, 0), Err(LayoutError::DepthOutOfRange(0)));
    assert_eq!(BspLayout::new(2, 7), Err(LayoutError::DepthOutOfRange(7)));
    assert!(BspLayout::new(2, 1).is_ok());
    assert!(BspLayout::new(2, 6).is_ok());
    assert_eq!(BspLayout::new(3, 1).unwrap().estimated_node_count(), 2);
    assert_eq!(BspLayout::new(3, 5).unwrap().estimated_node_count(), 32);
}

#[test]
fn flood_fill_rejects_bad_parameters() {
    assert_eq!(FloodFillLayout::new(4, 0.5), Err(LayoutError::NodeCountOutOfRange(4)));
    assert_eq!(FloodFillLayout::new(101, 0.5), Err(LayoutError::NodeCountOutOfRange(101)));
    assert!(FloodFillLayout::new(50, 0.05).is_err());
    assert!(FloodFillLayout::new(50, 1.01).is_err());
    assert!(FloodFillLayout::new(5, 0.1).is_ok());
    assert!(FloodFillLayout::new(100, 1.0).is_ok());
}

#[test]
fn biome_names_select_layouts() {
    for name in ["Ancient Dungeon", "ANCIENT DUNGEON"] {
        assert!(matches!(GraphLayout::for_biome(name), GraphLayout::Grid(_)), "{name}");
    }
    match GraphLayout::for_biome("Wizard's Tower") {
        GraphLayout::Grid(g) => assert!(g.height() > g.width()),
        other => panic!("tower should be a grid, got {other:?}"),
    }
    for name in ["Abandoned Building", "Lost Temple", "Ancient Ruins", "lost temple"] {
        assert!(
            matches!(GraphLayout::for_biome(name), GraphLayout::BinarySpacePartition(_)),
            "{name}"
        );
    }
    for name in ["Dark Caverns", "Abandoned Mine", "Enchanted Forest", "DARK CAVERNS"] {
        assert!(matches!(GraphLayout::for_biome(name), GraphLayout::FloodFill(_)), "{name}");
    }
    match GraphLayout::for_biome("Unknown Theme XYZ") {
        GraphLayout::Grid(g) => assert_eq!((g.width(), g.height()), (5, 5)),
        other => panic!("fallback should be a 5x5 grid, got {other:?}"),
    }
}

#[test]
fn node_counts_select_layouts() {
    let small = GraphLayout::for_node_count(10);
    assert!(matches!(small, GraphLayout::Grid(_)));
    assert_eq!(small.node_count(), 9);

    let floor = GraphLayout::for_node_count(3);
    assert!(matches!(floor, GraphLayout::Grid(g) if g.width() == 3 && g.height() == 3));

    let medium = GraphLayout::for_node_count(25);
    assert!(matches!(medium, GraphLayout::Grid(_)));
    assert_eq!(medium.node_count(), 25);

    assert!(matches!(GraphLayout::for_node_count(50), GraphLayout::BinarySpacePartition(_)));

    match GraphLayout::for_node_count(75) {
        GraphLayout::FloodFill(f) => assert_eq!(f.node_count(), 75),
        other => panic!("expected flood fill, got {other:?}"),
    }
    match GraphLayout::for_node_count(200) {
        GraphLayout::FloodFill(f) => assert_eq!(f.node_count(), 100),
        other => panic!("expected flood fill, got {other:?}"),
    }
}

#[test]
fn layouts_deserialize_through_validation() {
    let ok: GraphLayout = serde_json::from_str(r#"{"kind":"grid","width":4,"height":3}"#).unwrap();
    assert_eq!(ok.node_count(), 12);

    let bsp: GraphLayout =
        serde_json::from_str(r#"{"kind":"binary_space_partition","min_room_size":3,"max_depth":4}"#)
            .unwrap();
    assert!(matches!(bsp, GraphLayout::BinarySpacePartition(_)));

    let too_big = serde_json::from_str::<GraphLayout>(r#"{"kind":"grid","width":20,"height":20}"#);
    assert!(too_big.is_err());
    let too_sparse =
        serde_json::from_str::<GraphLayout>(r#"{"kind":"flood_fill","node_count":20,"density":0.0}"#);
    assert!(too_sparse.is_err());
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[test]
fn generation_is_deterministic_per_seed() {
    let generator = GraphGenerator::new();
    for layout in all_layouts() {
        let a = generator.generate(CHUNK, &layout, 1234);
        let b = generator.generate(CHUNK, &layout, 1234);
        assert_eq!(a, b, "{layout:?}");

        let c = generator.generate(CHUNK, &layout, 1235);
        assert_ne!(a, c, "{layout:?}");
    }
}

#[test]
fn generated_graphs_validate_for_many_seeds() {
    let generator = GraphGenerator::new();
    for layout in all_layouts() {
        for seed in 0..50 {
            let nodes = generator.generate(CHUNK, &layout, seed);
            assert_eq!(validate(&nodes), Ok(()), "{layout:?} seed {seed}");
        }
    }
}

#[test]
fn node_ids_are_spaces_inside_the_chunk() {
    let nodes = GraphGenerator::new().generate(CHUNK, &grid(4, 4, 0.5), 9);
    for node in &nodes {
        assert_eq!(id::parse(&node.id), Some(ChunkLevel::Space));
        assert_eq!(id::extract_parent_id(&node.id).as_deref(), Some(CHUNK));
    }
}

#[test]
fn node_counts_match_layouts() {
    let generator = GraphGenerator::new();
    assert_eq!(generator.generate(CHUNK, &grid(7, 3, 0.2), 1).len(), 21);
    assert_eq!(
        generator.generate(CHUNK, &GraphLayout::flood_fill(42, 0.5).unwrap(), 1).len(),
        42
    );

    let bsp = GraphLayout::bsp(2, 5).unwrap();
    for seed in 0..20 {
        let rooms = generator.generate(CHUNK, &bsp, seed).len() as u32;
        assert!((2..=bsp.node_count()).contains(&rooms), "seed {seed}: {rooms} rooms");
    }
}

#[test]
fn every_edge_has_an_opposite_reverse() {
    let generator = GraphGenerator::new();
    for layout in all_layouts() {
        let nodes = generator.generate(CHUNK, &layout, 77);
        for node in &nodes {
            for edge in &node.edges {
                let target = nodes.iter().find(|n| n.id == edge.target).unwrap();
                assert!(target.edges.iter().any(|r| r.target == node.id
                    && r.direction == edge.direction.opposite()
                    && r.hidden == edge.hidden));
            }
        }
    }
}

#[test]
fn exactly_one_hub_best_connected_among_loop_rooms() {
    let generator = GraphGenerator::new();
    for layout in all_layouts() {
        for seed in 0..20 {
            let nodes = generator.generate(CHUNK, &layout, seed);
            let hubs: Vec<_> = nodes.iter().filter(|n| n.role == NodeRole::Hub).collect();
            assert_eq!(hubs.len(), 1);

            let on_loop: Vec<_> = nodes
                .iter()
                .filter(|n| find_loop_from(&nodes, &n.id, MIN_HUB_LOOP).is_some())
                .collect();
            let candidates = if on_loop.is_empty() {
                nodes.iter().collect()
            } else {
                on_loop
            };
            let most = candidates.iter().map(|n| n.edges.len()).max().unwrap();
            assert!(candidates.iter().any(|n| n.id == hubs[0].id), "{layout:?} seed {seed}");
            assert_eq!(hubs[0].edges.len(), most, "{layout:?} seed {seed}");
        }
    }
}

#[test]
fn roles_follow_edge_shape() {
    let nodes = GraphGenerator::new().generate(CHUNK, &grid(6, 6, 0.0), 3);
    for node in nodes.iter().filter(|n| !n.is_hub()) {
        match node.role {
            NodeRole::DeadEnd => assert_eq!(node.edges.len(), 1),
            NodeRole::Corridor => {
                assert_eq!(node.edges.len(), 2);
                assert_eq!(node.edges[0].direction.opposite(), node.edges[1].direction);
            }
            NodeRole::Ordinary => assert!(node.edges.len() >= 2),
            NodeRole::Hub => unreachable!(),
        }
    }
}

#[test]
fn full_loop_frequency_always_yields_a_cycle() {
    let generator = GraphGenerator::new();
    for layout in [grid(5, 5, 1.0), grid(2, 2, 1.0), grid(1, 4, 1.0), grid(1, 6, 1.0), grid(10, 1, 1.0)] {
        for seed in 0..200 {
            let nodes = generator.generate(CHUNK, &layout, seed);
            assert!(has_cycle(&nodes), "{layout:?} seed {seed}");
        }
    }
}

#[test]
fn zero_loop_frequency_yields_a_tree() {
    let generator = GraphGenerator::new();
    for seed in 0..50 {
        let nodes = generator.generate(CHUNK, &grid(5, 4, 0.0), seed);
        assert!(!has_cycle(&nodes), "seed {seed}");
        let connections: usize = nodes.iter().map(|n| n.edges.len()).sum::<usize>() / 2;
        assert_eq!(connections, nodes.len() - 1);
    }
}

#[test]
fn hub_loop_walks_back_to_hub() {
    let generator = GraphGenerator::new();
    let layouts = all_layouts().into_iter().chain([
        GraphLayout::for_biome("dungeon"),
        GraphLayout::for_biome("temple"),
        GraphLayout::for_biome("cave"),
        grid(10, 10, 0.1),
        grid(1, 4, 1.0),
        GraphLayout::bsp(2, 5).unwrap(),
        GraphLayout::flood_fill(100, 0.1).unwrap(),
    ]);
    for layout in layouts {
        for seed in 0..200 {
            let nodes = generator.generate(CHUNK, &layout, seed);
            if !has_cycle(&nodes) {
                continue;
            }
            let hub = hub_of(&nodes);

            let steps = find_loop_from(&nodes, &hub.id, MIN_HUB_LOOP)
                .unwrap_or_else(|| panic!("{layout:?} seed {seed}: hub is on no loop"));
            assert!(steps.len() >= MIN_HUB_LOOP);
            // Not a there-and-back: the first exit is not retraced on return.
            assert_ne!(steps[0].target, steps[steps.len() - 2].target);

            let end = walk(&nodes, &hub.id, steps.iter().map(|s| s.direction));
            assert_eq!(end.as_deref(), Some(hub.id.as_str()), "{layout:?} seed {seed}");
        }
    }
}

#[test]
fn walk_stops_at_missing_exit() {
    let nodes = GraphGenerator::new().generate(CHUNK, &grid(1, 3, 0.0), 0);
    let top = &nodes[0];
    assert!(top.edge(Direction::North).is_none());
    assert_eq!(walk(&nodes, &top.id, [Direction::North]), None);
    assert_eq!(walk(&nodes, "SPACE_nowhere_00000000", std::iter::empty()), None);
}

#[test]
fn dense_flood_fill_branches_into_cycles() {
    let generator = GraphGenerator::new();
    let layout = GraphLayout::flood_fill(100, 1.0).unwrap();
    for seed in 0..10 {
        assert!(has_cycle(&generator.generate(CHUNK, &layout, seed)), "seed {seed}");
    }
}

#[test]
fn hidden_edges_never_disconnect_visible_exits() {
    let generator = GraphGenerator::new().with_hidden_edge_chance(1.0);
    for layout in all_layouts() {
        for seed in 0..20 {
            let nodes = generator.generate(CHUNK, &layout, seed);
            assert_eq!(validate(&visible_only(&nodes)), Ok(()), "{layout:?} seed {seed}");
        }
    }
    // With everything beyond the spanning tree hidden, a dense grid does hide
    // some edges.
    let nodes = generator.generate(CHUNK, &grid(5, 5, 1.0), 0);
    assert!(nodes.iter().flat_map(|n| &n.edges).any(|e| e.hidden));
}

#[test]
fn hidden_edge_chance_is_sanitized() {
    assert_eq!(GraphGenerator::new().with_hidden_edge_chance(7.0).hidden_edge_chance(), 1.0);
    assert_eq!(GraphGenerator::new().with_hidden_edge_chance(-1.0).hidden_edge_chance(), 0.0);

    let generator = GraphGenerator::new().with_hidden_edge_chance(f64::NAN);
    assert_eq!(generator.hidden_edge_chance(), 0.0);
    let nodes = generator.generate(CHUNK, &grid(5, 5, 1.0), 0);
    assert!(nodes.iter().flat_map(|n| &n.edges).all(|e| !e.hidden));
}

#[test]
fn batch_generation_matches_sequential() {
    let generator = GraphGenerator::new();
    let requests: Vec<GenerationRequest> = all_layouts()
        .into_iter()
        .enumerate()
        .map(|(i, layout)| GenerationRequest {
            chunk_id: format!("SUBZONE_orphan_{i:08x}"),
            layout,
            seed: i as u64 * 31,
        })
        .collect();

    let batch = generator.generate_batch(&requests);
    assert_eq!(batch.len(), requests.len());
    for (request, nodes) in requests.iter().zip(&batch) {
        assert_eq!(nodes, &generator.generate(&request.chunk_id, &request.layout, request.seed));
    }
}

#[test]
fn dot_export_draws_each_connection_once() {
    let nodes = GraphGenerator::new().generate(CHUNK, &grid(3, 3, 0.0), 4);
    let dot = graph::to_dot(&nodes);
    assert!(dot.starts_with("graph topology {"));
    assert_eq!(dot.matches(" -- ").count(), nodes.len() - 1);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn sample() -> Vec<GraphNode> {
    GraphGenerator::new().generate(CHUNK, &grid(3, 3, 0.5), 11)
}

#[test]
fn empty_graph_is_rejected() {
    assert_eq!(validate(&[]), Err(ValidationError::Empty));
}

#[test]
fn dangling_edge_is_reported() {
    let mut nodes = sample();
    nodes[0].edges.push(Edge {
        target: "SPACE_elsewhere_deadbeef".into(),
        direction: Direction::Up,
        hidden: false,
    });
    assert_eq!(
        validate(&nodes),
        Err(ValidationError::DanglingEdge {
            from: nodes[0].id.clone(),
            to: "SPACE_elsewhere_deadbeef".into(),
        })
    );
}

#[test]
fn isolated_node_is_reported() {
    let mut nodes = sample();
    nodes.push(GraphNode {
        id: "SPACE_island_00000001".into(),
        role: NodeRole::Ordinary,
        edges: Vec::new(),
        position: (9, 9),
    });
    assert_eq!(
        validate(&nodes),
        Err(ValidationError::Disconnected {
            unreachable: vec!["SPACE_island_00000001".into()],
        })
    );
}

#[test]
fn graph_without_hub_is_reported() {
    let mut nodes = sample();
    for node in &mut nodes {
        node.role = NodeRole::Ordinary;
    }
    assert_eq!(validate(&nodes), Err(ValidationError::MissingHub));
}

#[test]
fn duplicate_id_is_reported() {
    let mut nodes = sample();
    let copy = nodes.iter().find(|n| !n.is_hub()).unwrap().clone();
    let duplicated = copy.id.clone();
    nodes.push(copy);
    assert_eq!(validate(&nodes), Err(ValidationError::DuplicateId(duplicated)));
}

#[test]
fn dangling_edge_wins_over_disconnection() {
    let mut nodes = sample();
    nodes.push(GraphNode {
        id: "SPACE_island_00000002".into(),
        role: NodeRole::Ordinary,
        edges: vec![Edge {
            target: "SPACE_void_00000003".into(),
            direction: Direction::Down,
            hidden: true,
        }],
        position: (8, 8),
    });
    assert!(matches!(validate(&nodes), Err(ValidationError::DanglingEdge { .. })));
}
