use super::{Direction, Edge, GraphNode, NodeRole, cycles};
use crate::layout::{BspLayout, FloodFillLayout, GraphLayout, GridLayout};
use crate::world::{ChunkLevel, id};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

/// Chance that a connection added beyond the spanning structure is hidden.
/// Spanning connections are never hidden, so visible exits alone always keep
/// the graph connected.
pub const HIDDEN_EDGE_CHANCE: f64 = 0.1;

/// Shortest loop through the hub in a cyclic graph.
pub const MIN_HUB_LOOP: usize = 4;

const PLANAR: [Direction; 4] = [
    Direction::North,
    Direction::South,
    Direction::East,
    Direction::West,
];

/// One entry of a [`GraphGenerator::generate_batch`] call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub chunk_id: String,
    pub layout: GraphLayout,
    pub seed: u64,
}

/// Turns a layout and a seed into a room graph.
///
/// Generation is pure: the same `(chunk_id, layout, seed)` always yields the
/// same nodes, ids included. Node ids are `SPACE` ids parented to `chunk_id`.
pub struct GraphGenerator {
    hidden_edge_chance: f64,
}

impl GraphGenerator {
    pub fn new() -> Self {
        Self {
            hidden_edge_chance: HIDDEN_EDGE_CHANCE,
        }
    }

    /// Override the hidden-edge probability. Clamped to `[0, 1]`; NaN
    /// disables hidden edges.
    pub fn with_hidden_edge_chance(mut self, chance: f64) -> Self {
        self.hidden_edge_chance = if chance.is_nan() {
            0.0
        } else {
            chance.clamp(0.0, 1.0)
        };
        self
    }

    pub fn hidden_edge_chance(&self) -> f64 {
        self.hidden_edge_chance
    }

    pub fn generate(&self, chunk_id: &str, layout: &GraphLayout, seed: u64) -> Vec<GraphNode> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut builder = GraphBuilder::new(chunk_id, self.hidden_edge_chance);

        match layout {
            GraphLayout::Grid(grid) => build_grid(&mut builder, grid, &mut rng),
            GraphLayout::BinarySpacePartition(bsp) => build_bsp(&mut builder, bsp, &mut rng),
            GraphLayout::FloodFill(fill) => build_flood_fill(&mut builder, fill, &mut rng),
        }

        let nodes = builder.finish();
        tracing::debug!(
            "Generated {} nodes for {} ({} layout, seed {})",
            nodes.len(),
            chunk_id,
            layout.name(),
            seed
        );
        nodes
    }

    /// Generate many graphs on the rayon pool. Output order matches `requests`
    /// and each graph is identical to what [`generate`](Self::generate) returns.
    pub fn generate_batch(&self, requests: &[GenerationRequest]) -> Vec<Vec<GraphNode>> {
        requests
            .par_iter()
            .map(|r| self.generate(&r.chunk_id, &r.layout, r.seed))
            .collect()
    }
}

impl Default for GraphGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Node/edge bookkeeping shared by every strategy ──────────────────────────

struct GraphBuilder<'a> {
    chunk_id: &'a str,
    hidden_edge_chance: f64,
    nodes: Vec<GraphNode>,
    ids: HashSet<String>,
}

impl<'a> GraphBuilder<'a> {
    fn new(chunk_id: &'a str, hidden_edge_chance: f64) -> Self {
        Self {
            chunk_id,
            hidden_edge_chance,
            nodes: Vec::new(),
            ids: HashSet::new(),
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn position(&self, node: usize) -> (i32, i32) {
        self.nodes[node].position
    }

    fn add_node(&mut self, position: (i32, i32), rng: &mut ChaCha8Rng) -> usize {
        let id = loop {
            let candidate = id::generate_seeded(ChunkLevel::Space, Some(self.chunk_id), rng);
            if self.ids.insert(candidate.clone()) {
                break candidate;
            }
        };
        self.nodes.push(GraphNode {
            id,
            role: NodeRole::Ordinary,
            edges: Vec::new(),
            position,
        });
        self.nodes.len() - 1
    }

    /// Fewest connections between two nodes, if they are connected.
    fn hops(&self, from: usize, to: usize) -> Option<usize> {
        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let mut dist = vec![usize::MAX; self.nodes.len()];
        dist[from] = 0;
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return Some(dist[current]);
            }
            for edge in &self.nodes[current].edges {
                let Some(&next) = index.get(edge.target.as_str()) else {
                    continue;
                };
                if dist[next] == usize::MAX {
                    dist[next] = dist[current] + 1;
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Spanning connection.
    fn link(&mut self, a: usize, b: usize) {
        self.connect(a, b, false);
    }

    /// Connection beyond the spanning structure: closes a cycle, may be hidden.
    fn link_loop(&mut self, a: usize, b: usize, rng: &mut ChaCha8Rng) {
        let hidden = rng.gen_bool(self.hidden_edge_chance);
        self.connect(a, b, hidden);
    }

    fn connect(&mut self, a: usize, b: usize, hidden: bool) {
        let preferred = Direction::between(self.position(a), self.position(b));
        let direction = self.free_direction(a, b, preferred).unwrap_or(preferred);
        let (to_b, to_a) = (self.nodes[b].id.clone(), self.nodes[a].id.clone());
        self.nodes[a].edges.push(Edge {
            target: to_b,
            direction,
            hidden,
        });
        self.nodes[b].edges.push(Edge {
            target: to_a,
            direction: direction.opposite(),
            hidden,
        });
    }

    /// First direction unused on `a` whose opposite is unused on `b`, so that
    /// following a direction label from any node is unambiguous.
    fn free_direction(&self, a: usize, b: usize, preferred: Direction) -> Option<Direction> {
        [preferred, Direction::Up, Direction::Down]
            .into_iter()
            .chain(Direction::ALL)
            .find(|d| self.nodes[a].edge(*d).is_none() && self.nodes[b].edge(d.opposite()).is_none())
    }

    /// Assign roles. The hub is the best-connected node that lies on a loop
    /// of at least [`MIN_HUB_LOOP`] rooms, or the best-connected node overall
    /// when the graph has no such loop. Ties go to the earliest node.
    fn finish(mut self) -> Vec<GraphNode> {
        let mut by_degree: Vec<usize> = (0..self.nodes.len()).collect();
        by_degree.sort_by_key(|&i| std::cmp::Reverse(self.nodes[i].edges.len()));

        let on_loop = if cycles::has_cycle(&self.nodes) {
            by_degree.iter().copied().find(|&i| {
                cycles::find_loop_from(&self.nodes, &self.nodes[i].id, MIN_HUB_LOOP).is_some()
            })
        } else {
            None
        };
        let hub = on_loop.or_else(|| by_degree.first().copied());

        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.role = if Some(i) == hub {
                NodeRole::Hub
            } else {
                match node.edges.as_slice() {
                    [_] => NodeRole::DeadEnd,
                    [a, b] if a.direction.opposite() == b.direction => NodeRole::Corridor,
                    _ => NodeRole::Ordinary,
                }
            };
        }
        self.nodes
    }
}

// ── Grid ────────────────────────────────────────────────────────────────────

/// Randomized depth-first spanning tree over the lattice, then every other
/// lattice edge with probability `loop_frequency`.
fn build_grid(b: &mut GraphBuilder<'_>, grid: &GridLayout, rng: &mut ChaCha8Rng) {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    for y in 0..h {
        for x in 0..w {
            b.add_node((x, y), rng);
        }
    }
    let index = |(x, y): (i32, i32)| (y * w + x) as usize;
    let in_bounds = |(x, y): (i32, i32)| x >= 0 && y >= 0 && x < w && y < h;
    let total = b.len();

    let mut visited = vec![false; total];
    let mut tree: HashSet<(usize, usize)> = HashSet::new();
    let start = rng.gen_range(0..total);
    visited[start] = true;
    let mut stack = vec![start];

    while let Some(&current) = stack.last() {
        let (cx, cy) = b.position(current);
        let options: Vec<usize> = PLANAR
            .iter()
            .filter_map(|d| d.offset())
            .map(|(dx, dy)| (cx + dx, cy + dy))
            .filter(|&p| in_bounds(p))
            .map(index)
            .filter(|&n| !visited[n])
            .collect();

        if options.is_empty() {
            stack.pop();
            continue;
        }
        let next = options[rng.gen_range(0..options.len())];
        visited[next] = true;
        b.link(current, next);
        tree.insert(edge_key(current, next));
        stack.push(next);
    }

    for y in 0..h {
        for x in 0..w {
            let here = index((x, y));
            for neighbour in [(x + 1, y), (x, y + 1)] {
                if !in_bounds(neighbour) {
                    continue;
                }
                let there = index(neighbour);
                if !tree.contains(&edge_key(here, there)) && rng.gen_bool(grid.loop_frequency()) {
                    b.link_loop(here, there, rng);
                }
            }
        }
    }

    // A single row or column has no lattice cycle at all; join its two ends.
    // Layout validation keeps loops off lines too short for a 4-room loop.
    if (w == 1 || h == 1) && total >= MIN_HUB_LOOP && rng.gen_bool(grid.loop_frequency()) {
        b.link_loop(0, total - 1, rng);
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

// ── Binary space partition ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl Rect {
    fn centre(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

fn build_bsp(b: &mut GraphBuilder<'_>, bsp: &BspLayout, rng: &mut ChaCha8Rng) {
    let side = (bsp.min_room_size() as i32) << (bsp.max_depth().div_ceil(2) + 1);
    let bounds = Rect {
        x: 0,
        y: 0,
        w: side,
        h: side,
    };
    partition(b, bounds, 0, bsp, rng);
}

/// Split `rect` until the depth limit or the room size floor, returning the
/// rooms placed inside it. Each pair of sibling subtrees is joined by one
/// corridor between their closest rooms; the two halves of the root split
/// get a second, cousin corridor.
fn partition(
    b: &mut GraphBuilder<'_>,
    rect: Rect,
    depth: u32,
    bsp: &BspLayout,
    rng: &mut ChaCha8Rng,
) -> Vec<usize> {
    let min = bsp.min_room_size() as i32;
    let across_width = rect.w >= rect.h;
    let span = if across_width { rect.w } else { rect.h };

    if depth >= bsp.max_depth() || span < 2 * min {
        return vec![b.add_node(rect.centre(), rng)];
    }

    let cut = rng.gen_range(min..=span - min);
    let (first, second) = if across_width {
        (
            Rect { w: cut, ..rect },
            Rect {
                x: rect.x + cut,
                w: rect.w - cut,
                ..rect
            },
        )
    } else {
        (
            Rect { h: cut, ..rect },
            Rect {
                y: rect.y + cut,
                h: rect.h - cut,
                ..rect
            },
        )
    };

    let mut rooms = partition(b, first, depth + 1, bsp, rng);
    let other = partition(b, second, depth + 1, bsp, rng);

    let pairs = closest_pairs(b, &rooms, &other);
    if let Some(&(x, y)) = pairs.first() {
        b.link(x, y);
    }
    if depth == 0 {
        // Only a corridor closing a loop of at least MIN_HUB_LOOP rooms.
        let cousin = pairs
            .iter()
            .skip(1)
            .copied()
            .find(|&(x, y)| {
                b.free_direction(x, y, Direction::Up).is_some()
                    && b.hops(x, y).is_some_and(|h| h + 1 >= MIN_HUB_LOOP)
            });
        if let Some((x, y)) = cousin {
            b.link_loop(x, y, rng);
        }
    }

    rooms.extend(other);
    rooms
}

/// Every cross pair between two room sets, nearest first.
fn closest_pairs(b: &GraphBuilder<'_>, left: &[usize], right: &[usize]) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(i64, usize, usize)> = left
        .iter()
        .flat_map(|&l| right.iter().map(move |&r| (l, r)))
        .map(|(l, r)| {
            let (a, c) = (b.position(l), b.position(r));
            let (dx, dy) = (i64::from(a.0 - c.0), i64::from(a.1 - c.1));
            (dx * dx + dy * dy, l, r)
        })
        .collect();
    pairs.sort_unstable();
    pairs.into_iter().map(|(_, l, r)| (l, r)).collect()
}

// ── Flood fill ──────────────────────────────────────────────────────────────

/// Grow outwards from the origin on an unbounded lattice. Each new cell is
/// linked to the cell it grew from, then to each other placed neighbour with
/// probability `density`.
fn build_flood_fill(b: &mut GraphBuilder<'_>, fill: &FloodFillLayout, rng: &mut ChaCha8Rng) {
    let target = fill.node_count() as usize;
    let mut cells: HashMap<(i32, i32), usize> = HashMap::new();

    let origin = b.add_node((0, 0), rng);
    cells.insert((0, 0), origin);
    let mut frontier = vec![origin];

    while b.len() < target && !frontier.is_empty() {
        let slot = rng.gen_range(0..frontier.len());
        let parent = frontier[slot];
        let (px, py) = b.position(parent);

        let open: Vec<(i32, i32)> = PLANAR
            .iter()
            .filter_map(|d| d.offset())
            .map(|(dx, dy)| (px + dx, py + dy))
            .filter(|p| !cells.contains_key(p))
            .collect();
        if open.is_empty() {
            frontier.swap_remove(slot);
            continue;
        }

        let cell = open[rng.gen_range(0..open.len())];
        let node = b.add_node(cell, rng);
        cells.insert(cell, node);
        b.link(parent, node);

        for (dx, dy) in PLANAR.iter().filter_map(|d| d.offset()) {
            let Some(&other) = cells.get(&(cell.0 + dx, cell.1 + dy)) else {
                continue;
            };
            if other != parent && other != node && rng.gen_bool(fill.density()) {
                b.link_loop(node, other, rng);
            }
        }
        frontier.push(node);
    }
}
