//! Hierarchical chunk identifiers.
//!
//! An identifier is a plain string, usable as a primary key in any backend:
//!
//! ```text
//! WORLD_root                                  (the single world)
//! REGION_WORLD_root_3fa2c1d0                  ({LEVEL}_{parent}_{suffix})
//! ZONE_REGION_WORLD_root_3fa2c1d0_91be04aa
//! ```
//!
//! The parent segment is embedded verbatim, so the full ancestor chain can be
//! recovered from any id without a lookup. A non-world id created without a
//! parent carries the literal [`ORPHAN`] marker instead.

use super::level::ChunkLevel;
use rand::RngCore;
use uuid::Uuid;

/// The fixed identifier of the world root.
pub const WORLD_ROOT: &str = "WORLD_root";

/// Parent segment written for non-world ids generated without a parent.
pub const ORPHAN: &str = "orphan";

/// Length of the random suffix (lowercase hex).
pub const SUFFIX_LEN: usize = 8;

/// Allocate a fresh identifier for a chunk at `level` under `parent_id`.
///
/// `World` always yields [`WORLD_ROOT`], whatever the parent. Other levels
/// accept a missing parent and encode it as [`ORPHAN`].
pub fn generate(level: ChunkLevel, parent_id: Option<&str>) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    compose(level, parent_id, &uuid[..SUFFIX_LEN])
}

/// Like [`generate`], but the suffix comes from `rng`, so the same seed always
/// reproduces the same ids.
pub fn generate_seeded<R: RngCore + ?Sized>(
    level: ChunkLevel,
    parent_id: Option<&str>,
    rng: &mut R,
) -> String {
    compose(level, parent_id, &format!("{:08x}", rng.next_u32()))
}

fn compose(level: ChunkLevel, parent_id: Option<&str>, suffix: &str) -> String {
    if level == ChunkLevel::World {
        return WORLD_ROOT.to_string();
    }
    format!("{}_{}_{}", level.as_str(), parent_id.unwrap_or(ORPHAN), suffix)
}

/// Recover the level encoded in `id`. `None` for anything malformed.
pub fn parse(id: &str) -> Option<ChunkLevel> {
    let (prefix, rest) = id.split_once('_')?;
    if rest.is_empty() {
        return None;
    }
    prefix.parse().ok()
}

/// Recover the parent identifier embedded in `id`.
///
/// `None` for the world root and for ids with fewer than three segments.
/// Otherwise every token between the level prefix and the trailing suffix is
/// re-joined, which restores parents that themselves contain underscores.
pub fn extract_parent_id(id: &str) -> Option<String> {
    if id == WORLD_ROOT {
        return None;
    }
    let tokens: Vec<&str> = id.split('_').collect();
    if tokens.len() < 3 {
        return None;
    }
    Some(tokens[1..tokens.len() - 1].join("_"))
}
