//! Runtime configuration for world generation.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "world_seed": 7, "pending_ttl_secs": 30, "layout": { "kind": "grid", "width": 4, "height": 4 } }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use labyrinth_engine::layout::GraphLayout;
use serde::Deserialize;

use crate::cache::{DEFAULT_CAPACITY, GenerationCache, PendingPolicy};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Completed subzones kept in the generation cache.
    pub cache_capacity: usize,
    pub pending_ttl_secs: Option<u64>,
    pub world_seed: u64,
    pub default_biome: String,
    /// Used for every subzone instead of the biome's preset.
    pub layout: Option<GraphLayout>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            pending_ttl_secs: None,
            world_seed: 0,
            default_biome: "dungeon".into(),
            layout: None,
        }
    }
}

impl WorldConfig {
    /// Read a JSON config file. Layout parameters are validated here.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn pending_policy(&self) -> PendingPolicy {
        PendingPolicy {
            pending_ttl: self.pending_ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn build_cache<T: Clone>(&self) -> GenerationCache<T> {
        GenerationCache::new(self.cache_capacity, self.pending_policy())
    }

    /// Stable per-subzone seed: FNV-1a over the id, mixed with the world seed.
    pub fn seed_for(&self, chunk_id: &str) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let hash = chunk_id
            .bytes()
            .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
        hash ^ self.world_seed.rotate_left(32)
    }
}
