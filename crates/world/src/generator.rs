//! World-generation orchestrator.
//!
//! [`WorldGenerator`] builds the upper hierarchy on demand and generates
//! subzones (a room graph plus one space chunk per room) through the shared
//! [`GenerationCache`], so concurrent requests for one subzone generate it
//! exactly once and every caller receives the same result.

use std::sync::Arc;
use std::time::Instant;

use labyrinth_engine::graph::generator::GraphGenerator;
use labyrinth_engine::graph::validator::{self, ValidationError};
use labyrinth_engine::graph::{self, GraphNode};
use labyrinth_engine::layout::GraphLayout;
use labyrinth_engine::world::{ChunkLevel, id};

use crate::cache::{Claim, Completion, GenerationCache, GenerationContext, GenerationStatus};
use crate::describer::{DescribeError, DescribeRequest, Describer};
use crate::metrics::GenerationMetrics;
use crate::repository::{ChunkRepository, Exit, RepoError, WorldChunk};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0} is not a subzone id")]
    NotASubzone(String),
    #[error("cannot create a {0} chunk directly")]
    InvalidLevel(ChunkLevel),
    #[error("parent {level} {id} does not exist")]
    MissingParent { level: ChunkLevel, id: String },
    #[error("generated graph for {chunk_id} is invalid: {source}")]
    InvalidGraph {
        chunk_id: String,
        #[source]
        source: ValidationError,
    },
    #[error("generation of {chunk_id} failed in another task: {reason}")]
    JoinedFailed { chunk_id: String, reason: String },
    #[error("generation of {0} was cancelled")]
    Cancelled(String),
    #[error("{0} was generated but evicted before it could be read")]
    Evicted(String),
    #[error(transparent)]
    Describe(#[from] DescribeError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub type SubzoneCache = GenerationCache<Arc<GeneratedSubzone>>;

/// Ask for one subzone. The id is allocated up front (see
/// [`WorldGenerator::reserve_subzone_id`]) so that every actor heading into
/// the same unexplored subzone asks for the same key.
#[derive(Debug, Clone)]
pub struct SubzoneRequest {
    pub subzone_id: String,
    pub biome: String,
    pub seed: u64,
    /// Overrides the biome's default layout.
    pub layout: Option<GraphLayout>,
}

impl SubzoneRequest {
    pub fn new(subzone_id: impl Into<String>, biome: impl Into<String>, seed: u64) -> Self {
        Self {
            subzone_id: subzone_id.into(),
            biome: biome.into(),
            seed,
            layout: None,
        }
    }

    pub fn with_layout(mut self, layout: GraphLayout) -> Self {
        self.layout = Some(layout);
        self
    }
}

#[derive(Debug)]
pub struct GeneratedSubzone {
    pub chunk: WorldChunk,
    pub layout: GraphLayout,
    pub nodes: Vec<GraphNode>,
    pub hub_id: String,
}

impl GeneratedSubzone {
    /// Default spawn and return anchor.
    pub fn spawn_point(&self) -> &str {
        &self.hub_id
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn to_dot(&self) -> String {
        graph::to_dot(&self.nodes)
    }
}

pub struct WorldGenerator {
    repo: Arc<dyn ChunkRepository>,
    cache: Arc<SubzoneCache>,
    describer: Arc<dyn Describer>,
    metrics: Arc<GenerationMetrics>,
    graphs: GraphGenerator,
}

impl WorldGenerator {
    pub fn new(
        repo: Arc<dyn ChunkRepository>,
        cache: Arc<SubzoneCache>,
        describer: Arc<dyn Describer>,
    ) -> Self {
        Self {
            repo,
            cache,
            describer,
            metrics: Arc::new(GenerationMetrics::new()),
            graphs: GraphGenerator::new(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn ChunkRepository> {
        &self.repo
    }

    pub fn cache(&self) -> &Arc<SubzoneCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<GenerationMetrics> {
        &self.metrics
    }

    /// Persist the world root if it is not stored yet.
    pub async fn ensure_root_hierarchy(&self) -> Result<WorldChunk, GenerationError> {
        if let Some(root) = self.repo.find_by_id(id::WORLD_ROOT).await? {
            return Ok(root);
        }
        let mut root = WorldChunk::new(id::WORLD_ROOT, ChunkLevel::World, None);
        root.biome = "world".into();
        root.description = self
            .describer
            .describe(&DescribeRequest {
                chunk_id: id::WORLD_ROOT,
                level: ChunkLevel::World,
                biome: &root.biome,
                role: None,
            })
            .await?;
        self.repo.save(&root).await?;
        tracing::info!("Created world root");
        Ok(root)
    }

    /// Create and persist a region or zone under an existing parent.
    pub async fn create_chunk(
        &self,
        level: ChunkLevel,
        parent_id: &str,
        biome: &str,
    ) -> Result<WorldChunk, GenerationError> {
        if !matches!(level, ChunkLevel::Region | ChunkLevel::Zone) {
            return Err(GenerationError::InvalidLevel(level));
        }
        let parent_level = level.parent().ok_or(GenerationError::InvalidLevel(level))?;
        let parent = self
            .repo
            .find_by_id(parent_id)
            .await?
            .filter(|p| p.level == parent_level)
            .ok_or_else(|| GenerationError::MissingParent {
                level: parent_level,
                id: parent_id.to_string(),
            })?;

        let mut chunk = WorldChunk::new(id::generate(level, Some(&parent.id)), level, Some(parent.id));
        chunk.biome = biome.to_string();
        chunk.description = self
            .describer
            .describe(&DescribeRequest {
                chunk_id: &chunk.id,
                level,
                biome,
                role: None,
            })
            .await?;
        self.repo.save(&chunk).await?;
        tracing::debug!("Created {} {}", level, chunk.id);
        Ok(chunk)
    }

    /// Allocate the id of a subzone under `zone_id` without generating it.
    pub fn reserve_subzone_id(zone_id: &str) -> String {
        id::generate(ChunkLevel::Subzone, Some(zone_id))
    }

    /// Generated subzone for `request`, generating it if nobody has yet.
    ///
    /// Exactly one concurrent caller per subzone id does the work; the others
    /// wait for it and receive the same `Arc`. A failed generation is not
    /// cached: every waiter gets the failure and a later request retries.
    pub async fn generate_subzone(
        &self,
        request: &SubzoneRequest,
    ) -> Result<Arc<GeneratedSubzone>, GenerationError> {
        let id = request.subzone_id.as_str();
        let context = GenerationContext::new(id, request.seed);

        match self.cache.claim(id, context) {
            Claim::Cached(subzone) => {
                self.metrics.record_hit();
                Ok(subzone)
            }
            Claim::Join(context) => {
                self.metrics.record_join();
                tracing::debug!("Joining in-flight generation of {}", id);
                self.join(&context).await
            }
            Claim::Owner(context) => {
                let mut guard = OwnerGuard {
                    cache: &self.cache,
                    context: &context,
                    armed: true,
                };
                let started = Instant::now();

                let result = self.build_subzone(request).await;
                guard.armed = false;

                match result {
                    Ok(subzone) => match self.cache.cache_complete_for(&context, subzone.into()) {
                        Completion::Stored(subzone) => {
                            self.metrics
                                .record_generation(subzone.nodes.len() as u64, started.elapsed());
                            tracing::info!(
                                "Generated subzone {} ({} layout, {} spaces) in {:?}",
                                id,
                                subzone.layout.name(),
                                subzone.nodes.len(),
                                started.elapsed()
                            );
                            Ok(subzone)
                        }
                        // Lost ownership to a TTL drop; defer to whoever holds the id now.
                        Completion::Kept(existing) => Ok(existing),
                        Completion::Superseded(newer) => self.join(&newer).await,
                    },
                    Err(e) => {
                        self.cache.abandon(&context, e.to_string());
                        self.metrics.record_failure();
                        Err(e)
                    }
                }
            }
        }
    }

    /// Wait for another generation of the same subzone and read its result.
    async fn join(
        &self,
        context: &GenerationContext,
    ) -> Result<Arc<GeneratedSubzone>, GenerationError> {
        let id = context.chunk_id();
        match context.wait().await {
            GenerationStatus::Completed => self
                .cache
                .get_cached(id)
                .ok_or_else(|| GenerationError::Evicted(id.to_string())),
            GenerationStatus::Failed(reason) => Err(GenerationError::JoinedFailed {
                chunk_id: id.to_string(),
                reason,
            }),
            GenerationStatus::Cancelled | GenerationStatus::Pending => {
                Err(GenerationError::Cancelled(id.to_string()))
            }
        }
    }

    /// Hub space of a generated subzone, where actors entering it spawn.
    pub fn spawn_point(&self, subzone_id: &str) -> Option<String> {
        self.cache
            .get_cached(subzone_id)
            .map(|subzone| subzone.hub_id.clone())
    }

    /// Stored space chunks of a subzone, ordered by id.
    pub async fn spaces_of(&self, subzone_id: &str) -> Result<Vec<WorldChunk>, GenerationError> {
        Ok(self.repo.children_of(subzone_id).await?)
    }

    async fn build_subzone(&self, request: &SubzoneRequest) -> Result<GeneratedSubzone, GenerationError> {
        let subzone_id = request.subzone_id.as_str();
        if id::parse(subzone_id) != Some(ChunkLevel::Subzone) {
            return Err(GenerationError::NotASubzone(subzone_id.to_string()));
        }
        let zone_id = id::extract_parent_id(subzone_id)
            .ok_or_else(|| GenerationError::NotASubzone(subzone_id.to_string()))?;
        let zone = self
            .repo
            .find_by_id(&zone_id)
            .await?
            .filter(|z| z.level == ChunkLevel::Zone)
            .ok_or_else(|| GenerationError::MissingParent {
                level: ChunkLevel::Zone,
                id: zone_id.clone(),
            })?;

        let layout = request
            .layout
            .unwrap_or_else(|| GraphLayout::for_biome(&request.biome));
        let nodes = self.graphs.generate(subzone_id, &layout, request.seed);
        let invalid = |source| GenerationError::InvalidGraph {
            chunk_id: subzone_id.to_string(),
            source,
        };
        validator::validate(&nodes).map_err(invalid)?;
        let hub_id = graph::hub(&nodes)
            .map(|hub| hub.id.clone())
            .ok_or_else(|| invalid(ValidationError::MissingHub))?;

        let mut chunk = WorldChunk::new(subzone_id, ChunkLevel::Subzone, Some(zone.id));
        chunk.biome = request.biome.clone();
        chunk.description = self
            .describer
            .describe(&DescribeRequest {
                chunk_id: subzone_id,
                level: ChunkLevel::Subzone,
                biome: &request.biome,
                role: None,
            })
            .await?;

        let mut spaces = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let mut space = WorldChunk::new(
                node.id.clone(),
                ChunkLevel::Space,
                Some(subzone_id.to_string()),
            );
            space.biome = request.biome.clone();
            space.description = self
                .describer
                .describe(&DescribeRequest {
                    chunk_id: &node.id,
                    level: ChunkLevel::Space,
                    biome: &request.biome,
                    role: Some(node.role),
                })
                .await?;
            space.exits = node.edges.iter().map(Exit::from).collect();
            spaces.push(space);
        }

        // Spaces first: once the subzone row exists, its rooms do too.
        for space in &spaces {
            self.repo.save(space).await?;
        }
        self.repo.save(&chunk).await?;

        Ok(GeneratedSubzone {
            chunk,
            layout,
            nodes,
            hub_id,
        })
    }
}

/// Releases the pending entry if the owning future is dropped mid-generation,
/// so joiners are woken instead of waiting on an entry nobody will complete.
struct OwnerGuard<'a> {
    cache: &'a SubzoneCache,
    context: &'a GenerationContext,
    armed: bool,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.abandon(self.context, "generation task dropped");
        }
    }
}
