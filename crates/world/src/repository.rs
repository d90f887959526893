//! Chunk storage contract.
//!
//! The generator and navigation code only see [`ChunkRepository`]; real
//! deployments back it with a database. [`InMemoryChunkRepository`] is the
//! lock-sharded store used by the demo binary and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use labyrinth_engine::graph::{Direction, Edge};
use labyrinth_engine::world::ChunkLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("repository backend error: {0}")]
    Backend(String),
}

/// A traversable exit of a space, derived from a graph edge.
///
/// Hidden exits are stored like any other; revealing them is up to whoever
/// consumes the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub direction: Direction,
    pub target: String,
    pub hidden: bool,
}

impl From<&Edge> for Exit {
    fn from(edge: &Edge) -> Self {
        Self {
            direction: edge.direction,
            target: edge.target.clone(),
            hidden: edge.hidden,
        }
    }
}

/// One node of the spatial hierarchy as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldChunk {
    pub id: String,
    pub level: ChunkLevel,
    pub parent_id: Option<String>,
    pub biome: String,
    pub description: String,
    /// Only populated for spaces.
    pub exits: Vec<Exit>,
}

impl WorldChunk {
    pub fn new(id: impl Into<String>, level: ChunkLevel, parent_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            level,
            parent_id,
            biome: String::new(),
            description: String::new(),
            exits: Vec::new(),
        }
    }

    pub fn visible_exits(&self) -> impl Iterator<Item = &Exit> {
        self.exits.iter().filter(|e| !e.hidden)
    }
}

#[async_trait]
pub trait ChunkRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<WorldChunk>, RepoError>;
    /// Insert or replace.
    async fn save(&self, chunk: &WorldChunk) -> Result<(), RepoError>;
    async fn children_of(&self, parent_id: &str) -> Result<Vec<WorldChunk>, RepoError>;
}

/// Thread-safe in-memory repository, lock-sharded by chunk id.
pub struct InMemoryChunkRepository {
    chunks: DashMap<String, WorldChunk>,
}

impl InMemoryChunkRepository {
    pub fn new() -> Self {
        Self {
            chunks: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn remove(&self, id: &str) -> Option<WorldChunk> {
        self.chunks.remove(id).map(|(_, chunk)| chunk)
    }

    /// Number of stored chunks at `level`.
    pub fn count_at(&self, level: ChunkLevel) -> usize {
        self.chunks.iter().filter(|c| c.level == level).count()
    }
}

impl Default for InMemoryChunkRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkRepository for InMemoryChunkRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<WorldChunk>, RepoError> {
        Ok(self.chunks.get(id).map(|c| c.value().clone()))
    }

    async fn save(&self, chunk: &WorldChunk) -> Result<(), RepoError> {
        self.chunks.insert(chunk.id.clone(), chunk.clone());
        Ok(())
    }

    async fn children_of(&self, parent_id: &str) -> Result<Vec<WorldChunk>, RepoError> {
        let mut children: Vec<WorldChunk> = self
            .chunks
            .iter()
            .filter(|c| c.parent_id.as_deref() == Some(parent_id))
            .map(|c| c.value().clone())
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(children)
    }
}
