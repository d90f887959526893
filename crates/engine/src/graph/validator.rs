use super::GraphNode;
use std::collections::{HashMap, HashSet, VecDeque};

/// First structural defect found in a node set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("graph has no nodes")]
    Empty,
    #[error("edge from {from} points at unknown node {to}")]
    DanglingEdge { from: String, to: String },
    #[error("graph has no hub node")]
    MissingHub,
    #[error("nodes unreachable from the hub: {unreachable:?}")]
    Disconnected { unreachable: Vec<String> },
    #[error("node id {0} appears more than once")]
    DuplicateId(String),
}

/// Check a generated node set. In order: every edge target exists, every node
/// is reachable from the hub (edges treated as undirected), no id repeats.
/// Hidden edges count as structure here.
pub fn validate(nodes: &[GraphNode]) -> Result<(), ValidationError> {
    if nodes.is_empty() {
        return Err(ValidationError::Empty);
    }

    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for node in nodes {
        if let Some(edge) = node.edges.iter().find(|e| !known.contains(e.target.as_str())) {
            return Err(ValidationError::DanglingEdge {
                from: node.id.clone(),
                to: edge.target.clone(),
            });
        }
    }

    let hub = super::hub(nodes).ok_or(ValidationError::MissingHub)?;
    let reached = reachable_from(nodes, &hub.id);
    let unreachable: Vec<String> = nodes
        .iter()
        .filter(|n| !reached.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();
    if !unreachable.is_empty() {
        return Err(ValidationError::Disconnected { unreachable });
    }

    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateId(node.id.clone()));
        }
    }

    Ok(())
}

/// Undirected reachability: an edge links both of its endpoints regardless
/// of which node stores it.
fn reachable_from<'a>(nodes: &'a [GraphNode], start: &'a str) -> HashSet<&'a str> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        for edge in &node.edges {
            adjacency.entry(node.id.as_str()).or_default().push(edge.target.as_str());
            adjacency.entry(edge.target.as_str()).or_default().push(node.id.as_str());
        }
    }

    let mut reached = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for &next in adjacency.get(current).into_iter().flatten() {
            if reached.insert(next) {
                queue.push_back(next);
            }
        }
    }
    reached
}
