//! Narrative text for chunks.
//!
//! Real descriptions come from a separate text-generation service that may be
//! slow; the orchestrator only needs a string back, and calls this outside
//! any cache lock.

use async_trait::async_trait;
use labyrinth_engine::graph::NodeRole;
use labyrinth_engine::world::ChunkLevel;

#[derive(Debug, thiserror::Error)]
#[error("description unavailable for {chunk_id}: {reason}")]
pub struct DescribeError {
    pub chunk_id: String,
    pub reason: String,
}

/// What a describer is asked to describe.
#[derive(Debug, Clone)]
pub struct DescribeRequest<'a> {
    pub chunk_id: &'a str,
    pub level: ChunkLevel,
    pub biome: &'a str,
    /// Set for spaces.
    pub role: Option<NodeRole>,
}

#[async_trait]
pub trait Describer: Send + Sync {
    async fn describe(&self, request: &DescribeRequest<'_>) -> Result<String, DescribeError>;
}

/// Fixed phrasing from level, biome, and role. Used when no text service is
/// wired in.
pub struct TemplateDescriber;

#[async_trait]
impl Describer for TemplateDescriber {
    async fn describe(&self, request: &DescribeRequest<'_>) -> Result<String, DescribeError> {
        let place = match request.role {
            Some(NodeRole::Hub) => "a wide central chamber",
            Some(NodeRole::DeadEnd) => "a cramped dead end",
            Some(NodeRole::Corridor) => "a narrow passage",
            Some(NodeRole::Ordinary) => "an unremarkable room",
            None => match request.level {
                ChunkLevel::World => "the known world",
                ChunkLevel::Region => "a sprawling region",
                ChunkLevel::Zone => "a distinct zone",
                ChunkLevel::Subzone | ChunkLevel::Space => "a cluster of rooms",
            },
        };
        Ok(format!("{place} of the {}", request.biome.to_lowercase()))
    }
}
