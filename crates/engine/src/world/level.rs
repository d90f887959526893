use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Depth of a chunk in the spatial hierarchy.
///
/// Strictly nested: every level except `World` has exactly one parent level,
/// and `Space` (a single room) has no children. The derived ordering follows
/// nesting depth, so `World < Region < ... < Space`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkLevel {
    World,
    Region,
    Zone,
    Subzone,
    Space,
}

impl ChunkLevel {
    pub const ALL: [ChunkLevel; 5] = [
        ChunkLevel::World,
        ChunkLevel::Region,
        ChunkLevel::Zone,
        ChunkLevel::Subzone,
        ChunkLevel::Space,
    ];

    /// Prefix used in chunk identifiers.
    pub const fn as_str(self) -> &'static str {
        match self {
            ChunkLevel::World => "WORLD",
            ChunkLevel::Region => "REGION",
            ChunkLevel::Zone => "ZONE",
            ChunkLevel::Subzone => "SUBZONE",
            ChunkLevel::Space => "SPACE",
        }
    }

    pub const fn parent(self) -> Option<ChunkLevel> {
        match self {
            ChunkLevel::World => None,
            ChunkLevel::Region => Some(ChunkLevel::World),
            ChunkLevel::Zone => Some(ChunkLevel::Region),
            ChunkLevel::Subzone => Some(ChunkLevel::Zone),
            ChunkLevel::Space => Some(ChunkLevel::Subzone),
        }
    }

    pub const fn child(self) -> Option<ChunkLevel> {
        match self {
            ChunkLevel::World => Some(ChunkLevel::Region),
            ChunkLevel::Region => Some(ChunkLevel::Zone),
            ChunkLevel::Zone => Some(ChunkLevel::Subzone),
            ChunkLevel::Subzone => Some(ChunkLevel::Space),
            ChunkLevel::Space => None,
        }
    }
}

impl fmt::Display for ChunkLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the level prefixes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chunk level: {0:?}")]
pub struct UnknownLevel(pub String);

impl FromStr for ChunkLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChunkLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}
