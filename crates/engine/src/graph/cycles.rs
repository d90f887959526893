//! Cycle analysis over generated graphs.
//!
//! Walks follow direction labels: from a node, direction `d` leads along the
//! first edge labelled `d`. Path searches only use edges a walk could take,
//! so every path returned here can be replayed with [`walk`].

use super::{Direction, GraphNode};
use std::collections::{HashMap, VecDeque};

/// One move of a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub direction: Direction,
    pub target: String,
}

/// True if the undirected connection graph contains a cycle.
///
/// A connection stored as an edge plus its reverse counts once; repeated
/// connections between the same pair count as a cycle.
pub fn has_cycle(nodes: &[GraphNode]) -> bool {
    let index = index_by_id(nodes);

    let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
    for (from, node) in nodes.iter().enumerate() {
        for edge in &node.edges {
            if let Some(&to) = index.get(edge.target.as_str()) {
                *directed.entry((from, to)).or_default() += 1;
            }
        }
    }

    let mut parent: Vec<usize> = (0..nodes.len()).collect();
    for (&(a, b), &count) in &directed {
        if a > b && directed.contains_key(&(b, a)) {
            continue; // counted from the other side
        }
        let reverse = directed.get(&(b, a)).copied().unwrap_or(0);
        let connections = if a == b { count } else { count.max(reverse) };
        for _ in 0..connections {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra == rb {
                return true;
            }
            parent[ra] = rb;
        }
    }
    false
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Shortest simple closed walk through `start` with at least `min_len` steps.
///
/// For each pair of distinct exits from `start`, a breadth-first search joins
/// their far ends without passing through `start`; the loop leaves by one exit
/// and returns through the other, so it never just steps back and forth.
pub fn find_loop_from(nodes: &[GraphNode], start: &str, min_len: usize) -> Option<Vec<Step>> {
    let index = index_by_id(nodes);
    let origin = *index.get(start)?;
    let exits = walkable(&nodes[origin]);

    let mut best: Option<Vec<Step>> = None;
    for (i, out) in exits.iter().enumerate() {
        for back in &exits[i + 1..] {
            if out.target == back.target {
                continue;
            }
            let (Some(&u), Some(&v)) = (index.get(out.target.as_str()), index.get(back.target.as_str()))
            else {
                continue;
            };
            let Some(middle) = shortest_path(nodes, &index, u, v, origin) else {
                continue;
            };
            let Some(closing) = walkable(&nodes[v]).into_iter().find(|s| s.target == start) else {
                continue;
            };

            let mut steps = Vec::with_capacity(middle.len() + 2);
            steps.push(out.clone());
            steps.extend(middle);
            steps.push(closing);

            let better = best.as_ref().is_none_or(|b| steps.len() < b.len());
            if steps.len() >= min_len && better {
                best = Some(steps);
            }
        }
    }
    best
}

/// Follow `directions` from `start`. Returns the id reached, or `None` if a
/// step has no matching edge.
pub fn walk<I>(nodes: &[GraphNode], start: &str, directions: I) -> Option<String>
where
    I: IntoIterator<Item = Direction>,
{
    let index = index_by_id(nodes);
    let mut current = *index.get(start)?;
    for direction in directions {
        let edge = nodes[current].edge(direction)?;
        current = *index.get(edge.target.as_str())?;
    }
    Some(nodes[current].id.clone())
}

fn index_by_id(nodes: &[GraphNode]) -> HashMap<&str, usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect()
}

/// Edges a walk can take from `node`: the first edge per direction.
fn walkable(node: &GraphNode) -> Vec<Step> {
    Direction::ALL
        .into_iter()
        .filter_map(|d| node.edge(d))
        .map(|e| Step {
            direction: e.direction,
            target: e.target.clone(),
        })
        .collect()
}

fn shortest_path(
    nodes: &[GraphNode],
    index: &HashMap<&str, usize>,
    from: usize,
    to: usize,
    avoid: usize,
) -> Option<Vec<Step>> {
    let mut came_from: HashMap<usize, (usize, Step)> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    let mut seen = vec![false; nodes.len()];
    seen[from] = true;
    seen[avoid] = true;

    while let Some(current) = queue.pop_front() {
        if current == to {
            let mut steps = Vec::new();
            let mut at = to;
            while at != from {
                let (prev, step) = came_from.remove(&at)?;
                steps.push(step);
                at = prev;
            }
            steps.reverse();
            return Some(steps);
        }
        for step in walkable(&nodes[current]) {
            let Some(&next) = index.get(step.target.as_str()) else {
                continue;
            };
            if !seen[next] {
                seen[next] = true;
                came_from.insert(next, (current, step));
                queue.push_back(next);
            }
        }
    }
    None
}
