pub mod cycles;
pub mod generator;
pub mod validator;

use serde::{Deserialize, Serialize};

/// Exit direction on an edge. Every generated edge has a reverse edge
/// labelled with [`Direction::opposite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Lattice step for the four planar directions (`y` grows southwards).
    pub const fn offset(self) -> Option<(i32, i32)> {
        match self {
            Direction::North => Some((0, -1)),
            Direction::South => Some((0, 1)),
            Direction::East => Some((1, 0)),
            Direction::West => Some((-1, 0)),
            Direction::Up | Direction::Down => None,
        }
    }

    /// Dominant planar direction from `from` towards `to`. Coincident points
    /// map to `Up`.
    pub fn between(from: (i32, i32), to: (i32, i32)) -> Direction {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        if dx == 0 && dy == 0 {
            Direction::Up
        } else if dx.abs() >= dy.abs() {
            if dx > 0 { Direction::East } else { Direction::West }
        } else if dy > 0 {
            Direction::South
        } else {
            Direction::North
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// What part a node plays in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Entry point and default spawn/return anchor. Exactly one per graph.
    Hub,
    DeadEnd,
    /// Two exits on opposite sides.
    Corridor,
    Ordinary,
}

/// A directed connection to another node, referenced by id only.
///
/// `hidden` is carried opaquely: hidden edges are part of the structure but
/// are not offered as exits until something outside this crate reveals them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub target: String,
    pub direction: Direction,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub role: NodeRole,
    pub edges: Vec<Edge>,
    /// Placement coordinate on the generation lattice.
    pub position: (i32, i32),
}

impl GraphNode {
    pub fn edge(&self, direction: Direction) -> Option<&Edge> {
        self.edges.iter().find(|e| e.direction == direction)
    }

    pub fn visible_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| !e.hidden)
    }

    pub fn is_hub(&self) -> bool {
        self.role == NodeRole::Hub
    }
}

/// The hub of a generated graph, if it has one.
pub fn hub(nodes: &[GraphNode]) -> Option<&GraphNode> {
    nodes.iter().find(|n| n.is_hub())
}

/// Export a node set in Graphviz DOT format.
///
/// Each connection is drawn once; hidden connections are dashed.
pub fn to_dot(nodes: &[GraphNode]) -> String {
    let mut out = String::from(
        "graph topology {\n  node [shape=box, fontname=\"monospace\", fontsize=10];\n",
    );
    for node in nodes {
        let fill = match node.role {
            NodeRole::Hub => "#d4edda",
            NodeRole::DeadEnd => "#f8d7da",
            NodeRole::Corridor => "#fff3cd",
            NodeRole::Ordinary => "#f8f9fa",
        };
        let (x, y) = node.position;
        out.push_str(&format!(
            "  \"{id}\" [label=\"{x},{y}\", pos=\"{x},{ny}!\", style=filled, fillcolor=\"{fill}\"];\n",
            id = node.id,
            ny = -y,
        ));
    }
    for node in nodes {
        for edge in &node.edges {
            // Reverse edges carry the same connection; draw it from one side.
            if node.id.as_str() > edge.target.as_str() {
                continue;
            }
            let style = if edge.hidden { "dashed" } else { "solid" };
            out.push_str(&format!(
                "  \"{}\" -- \"{}\" [label=\"{}\", style={style}];\n",
                node.id,
                edge.target,
                edge.direction.as_str(),
            ));
        }
    }
    out.push_str("}\n");
    out
}
