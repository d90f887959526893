//! Per-actor position in the spatial hierarchy.

use std::collections::VecDeque;

use labyrinth_engine::world::{ChunkLevel, id};

use crate::repository::{ChunkRepository, RepoError};

/// Most recent spaces kept in the breadcrumb trail.
pub const BREADCRUMB_CAPACITY: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("{0} is not a space id")]
    NotASpace(String),
    #[error("space {0} does not exist")]
    UnknownSpace(String),
    #[error("{0} has no parent segment")]
    NoParent(String),
    #[error("missing {level} ancestor {id}")]
    MissingAncestor { level: ChunkLevel, id: String },
    #[error("ancestor {id} is a {found}, expected a {expected}")]
    UnexpectedLevel {
        id: String,
        expected: ChunkLevel,
        found: ChunkLevel,
    },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Where an actor is: the current space, every ancestor up to the world, and
/// a bounded trail of recently visited spaces.
///
/// Ancestors are always resolved together from the repository, so they are
/// consistent with the current space. A failed resolution never changes an
/// existing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    space_id: String,
    subzone_id: String,
    zone_id: String,
    region_id: String,
    world_id: String,
    breadcrumbs: VecDeque<String>,
}

impl NavigationState {
    /// Resolve the full ancestor chain of `space_id`.
    pub async fn from_space_id(
        space_id: &str,
        repo: &dyn ChunkRepository,
    ) -> Result<Self, NavigationError> {
        let [subzone_id, zone_id, region_id, world_id] = resolve_ancestors(space_id, repo).await?;
        Ok(Self {
            space_id: space_id.to_string(),
            subzone_id,
            zone_id,
            region_id,
            world_id,
            breadcrumbs: VecDeque::with_capacity(BREADCRUMB_CAPACITY),
        })
    }

    /// Move to `new_space_id`, re-resolving every ancestor, and record the
    /// visit.
    pub async fn update_location(
        &mut self,
        new_space_id: &str,
        repo: &dyn ChunkRepository,
    ) -> Result<(), NavigationError> {
        let [subzone_id, zone_id, region_id, world_id] =
            resolve_ancestors(new_space_id, repo).await?;
        self.space_id = new_space_id.to_string();
        self.subzone_id = subzone_id;
        self.zone_id = zone_id;
        self.region_id = region_id;
        self.world_id = world_id;
        self.record_visit(new_space_id);
        Ok(())
    }

    /// Append to the trail without moving (used for peeking into a space).
    pub fn record_visit(&mut self, space_id: &str) {
        if self.breadcrumbs.len() == BREADCRUMB_CAPACITY {
            self.breadcrumbs.pop_front();
        }
        self.breadcrumbs.push_back(space_id.to_string());
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn subzone_id(&self) -> &str {
        &self.subzone_id
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    /// Oldest first.
    pub fn breadcrumbs(&self) -> impl ExactSizeIterator<Item = &str> {
        self.breadcrumbs.iter().map(String::as_str)
    }

    pub fn last_visited(&self) -> Option<&str> {
        self.breadcrumbs.back().map(String::as_str)
    }
}

/// Walk from a space to the world: `[subzone, zone, region, world]`.
async fn resolve_ancestors(
    space_id: &str,
    repo: &dyn ChunkRepository,
) -> Result<[String; 4], NavigationError> {
    if id::parse(space_id) != Some(ChunkLevel::Space) {
        return Err(NavigationError::NotASpace(space_id.to_string()));
    }
    if repo.find_by_id(space_id).await?.is_none() {
        return Err(NavigationError::UnknownSpace(space_id.to_string()));
    }

    let mut chain: [String; 4] = Default::default();
    let mut current = space_id.to_string();
    let levels = [
        ChunkLevel::Subzone,
        ChunkLevel::Zone,
        ChunkLevel::Region,
        ChunkLevel::World,
    ];

    for (slot, expected) in chain.iter_mut().zip(levels) {
        let parent_id =
            id::extract_parent_id(&current).ok_or_else(|| NavigationError::NoParent(current.clone()))?;
        let chunk = repo
            .find_by_id(&parent_id)
            .await?
            .ok_or_else(|| NavigationError::MissingAncestor {
                level: expected,
                id: parent_id.clone(),
            })?;
        if chunk.level != expected {
            return Err(NavigationError::UnexpectedLevel {
                id: parent_id,
                expected,
                found: chunk.level,
            });
        }
        tracing::trace!("Resolved {} ancestor {} of {}", expected, parent_id, space_id);
        *slot = parent_id.clone();
        current = parent_id;
    }

    Ok(chain)
}
