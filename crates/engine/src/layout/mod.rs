//! Topology strategies and their parameters.
//!
//! Every payload validates itself in its constructor and keeps its fields
//! private, so a `GraphLayout` that exists is always legal to generate from.
//! Deserialization goes through the same constructors.

use serde::{Deserialize, Serialize};

/// Largest lattice a grid layout may describe.
pub const MAX_GRID_NODES: u32 = 100;
/// Fewest rooms in a single-row or single-column grid that can close a loop.
pub const MIN_LOOPED_LINE: u32 = 4;
/// Smallest room edge a BSP split may produce.
pub const MIN_ROOM_SIZE: u32 = 2;
/// Deepest allowed BSP recursion.
pub const MAX_BSP_DEPTH: u32 = 6;
/// Legal flood-fill node counts.
pub const FLOOD_FILL_NODES: std::ops::RangeInclusive<u32> = 5..=100;
/// Legal flood-fill densities.
pub const FLOOD_FILL_DENSITY: std::ops::RangeInclusive<f64> = 0.1..=1.0;

const DEFAULT_LOOP_FREQUENCY: f64 = 0.3;
const DEFAULT_DENSITY: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("grid of {count} nodes exceeds the maximum of 100")]
    TooManyNodes { count: u32 },
    #[error("loop frequency must be within [0, 1], got {0}")]
    LoopFrequencyOutOfRange(f64),
    #[error("a {width}x{height} grid cannot hold a loop of 4 rooms; loop frequency must be 0")]
    NoRoomForLoops { width: u32, height: u32 },
    #[error("minimum room size must be at least 2, got {0}")]
    RoomTooSmall(u32),
    #[error("max depth must be within [1, 6], got {0}")]
    DepthOutOfRange(u32),
    #[error("flood fill node count must be within [5, 100], got {0}")]
    NodeCountOutOfRange(u32),
    #[error("flood fill density must be within [0.1, 1.0], got {0}")]
    DensityOutOfRange(f64),
}

/// A `width` x `height` lattice.
///
/// Any grid with a non-zero loop frequency yields a cycle of at least four
/// rooms at frequency 1.0. Single-row or single-column grids shorter than
/// [`MIN_LOOPED_LINE`] have no such cycle and only accept a frequency of 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    width: u32,
    height: u32,
    loop_frequency: f64,
}

impl GridLayout {
    pub fn new(width: u32, height: u32, loop_frequency: f64) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::InvalidDimensions { width, height });
        }
        let count = width.saturating_mul(height);
        if count > MAX_GRID_NODES {
            return Err(LayoutError::TooManyNodes { count });
        }
        // NaN fails `contains`, which is what we want.
        if !(0.0..=1.0).contains(&loop_frequency) {
            return Err(LayoutError::LoopFrequencyOutOfRange(loop_frequency));
        }
        let line = width == 1 || height == 1;
        if line && count < MIN_LOOPED_LINE && loop_frequency > 0.0 {
            return Err(LayoutError::NoRoomForLoops { width, height });
        }
        Ok(Self {
            width,
            height,
            loop_frequency,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Probability that a lattice edge outside the spanning tree is kept.
    pub fn loop_frequency(&self) -> f64 {
        self.loop_frequency
    }

    pub fn node_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Recursive binary space partition: one room per leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BspLayout {
    min_room_size: u32,
    max_depth: u32,
}

impl BspLayout {
    pub fn new(min_room_size: u32, max_depth: u32) -> Result<Self, LayoutError> {
        if min_room_size < MIN_ROOM_SIZE {
            return Err(LayoutError::RoomTooSmall(min_room_size));
        }
        if !(1..=MAX_BSP_DEPTH).contains(&max_depth) {
            return Err(LayoutError::DepthOutOfRange(max_depth));
        }
        Ok(Self {
            min_room_size,
            max_depth,
        })
    }

    pub fn min_room_size(&self) -> u32 {
        self.min_room_size
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Upper bound on the room count: a full tree has `2^max_depth` leaves.
    /// Splits stop early when a child would be too small, so real graphs may
    /// be smaller.
    pub fn estimated_node_count(&self) -> u32 {
        (1u32 << self.max_depth).max(2)
    }
}

/// Organic growth from a single seed cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloodFillLayout {
    node_count: u32,
    density: f64,
}

impl FloodFillLayout {
    pub fn new(node_count: u32, density: f64) -> Result<Self, LayoutError> {
        if !FLOOD_FILL_NODES.contains(&node_count) {
            return Err(LayoutError::NodeCountOutOfRange(node_count));
        }
        if !FLOOD_FILL_DENSITY.contains(&density) {
            return Err(LayoutError::DensityOutOfRange(density));
        }
        Ok(Self {
            node_count,
            density,
        })
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Probability of linking a new cell to each extra placed neighbour.
    pub fn density(&self) -> f64 {
        self.density
    }
}

/// How a chunk's room graph is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLayout", into = "RawLayout")]
pub enum GraphLayout {
    Grid(GridLayout),
    BinarySpacePartition(BspLayout),
    FloodFill(FloodFillLayout),
}

impl GraphLayout {
    pub fn grid(width: u32, height: u32, loop_frequency: f64) -> Result<Self, LayoutError> {
        GridLayout::new(width, height, loop_frequency).map(Self::Grid)
    }

    pub fn bsp(min_room_size: u32, max_depth: u32) -> Result<Self, LayoutError> {
        BspLayout::new(min_room_size, max_depth).map(Self::BinarySpacePartition)
    }

    pub fn flood_fill(node_count: u32, density: f64) -> Result<Self, LayoutError> {
        FloodFillLayout::new(node_count, density).map(Self::FloodFill)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GraphLayout::Grid(_) => "grid",
            GraphLayout::BinarySpacePartition(_) => "binary_space_partition",
            GraphLayout::FloodFill(_) => "flood_fill",
        }
    }

    /// Node count of the generated graph. Exact for grid and flood fill, an
    /// upper-bound estimate for BSP.
    pub fn node_count(&self) -> u32 {
        match self {
            GraphLayout::Grid(grid) => grid.node_count(),
            GraphLayout::BinarySpacePartition(bsp) => bsp.estimated_node_count(),
            GraphLayout::FloodFill(fill) => fill.node_count(),
        }
    }

    /// Pick a layout from a biome or theme name (case-insensitive keywords).
    ///
    /// Dungeons and towers are grids, with towers taller than wide. Built
    /// structures are partitioned. Natural spaces are flood-filled. Anything
    /// else falls back to a 5x5 grid.
    pub fn for_biome(name: &str) -> Self {
        let name = name.to_lowercase();
        let has = |keywords: &[&str]| keywords.iter().any(|k| name.contains(k));

        if has(&["tower"]) {
            Self::Grid(GridLayout {
                width: 3,
                height: 6,
                loop_frequency: 0.2,
            })
        } else if has(&["dungeon"]) {
            Self::default_grid()
        } else if has(&["building", "temple", "ruins"]) {
            Self::BinarySpacePartition(BspLayout {
                min_room_size: 4,
                max_depth: 4,
            })
        } else if has(&["cave", "mine", "forest"]) {
            Self::FloodFill(FloodFillLayout {
                node_count: 30,
                density: DEFAULT_DENSITY,
            })
        } else {
            Self::default_grid()
        }
    }

    /// Pick a layout sized for roughly `n` rooms.
    ///
    /// Small requests floor at a 3x3 grid; mid-size requests use a 5x5 grid or
    /// a BSP deep enough to hold `n` rooms; large requests flood-fill with the
    /// count clamped to the legal range.
    pub fn for_node_count(n: u32) -> Self {
        match n {
            0..=10 => Self::Grid(GridLayout {
                width: 3,
                height: 3,
                loop_frequency: DEFAULT_LOOP_FREQUENCY,
            }),
            11..=30 => Self::default_grid(),
            31..=55 => Self::BinarySpacePartition(BspLayout {
                min_room_size: 3,
                max_depth: n.next_power_of_two().trailing_zeros().clamp(1, MAX_BSP_DEPTH),
            }),
            _ => Self::FloodFill(FloodFillLayout {
                node_count: n.clamp(*FLOOD_FILL_NODES.start(), *FLOOD_FILL_NODES.end()),
                density: DEFAULT_DENSITY,
            }),
        }
    }

    fn default_grid() -> Self {
        Self::Grid(GridLayout {
            width: 5,
            height: 5,
            loop_frequency: DEFAULT_LOOP_FREQUENCY,
        })
    }
}

/// Wire shape of [`GraphLayout`]; converting back re-validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawLayout {
    Grid {
        width: u32,
        height: u32,
        #[serde(default = "default_loop_frequency")]
        loop_frequency: f64,
    },
    BinarySpacePartition {
        min_room_size: u32,
        max_depth: u32,
    },
    FloodFill {
        node_count: u32,
        #[serde(default = "default_density")]
        density: f64,
    },
}

fn default_loop_frequency() -> f64 {
    DEFAULT_LOOP_FREQUENCY
}

fn default_density() -> f64 {
    DEFAULT_DENSITY
}

impl TryFrom<RawLayout> for GraphLayout {
    type Error = LayoutError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        match raw {
            RawLayout::Grid {
                width,
                height,
                loop_frequency,
            } => GraphLayout::grid(width, height, loop_frequency),
            RawLayout::BinarySpacePartition {
                min_room_size,
                max_depth,
            } => GraphLayout::bsp(min_room_size, max_depth),
            RawLayout::FloodFill {
                node_count,
                density,
            } => GraphLayout::flood_fill(node_count, density),
        }
    }
}

impl From<GraphLayout> for RawLayout {
    fn from(layout: GraphLayout) -> Self {
        match layout {
            GraphLayout::Grid(g) => RawLayout::Grid {
                width: g.width,
                height: g.height,
                loop_frequency: g.loop_frequency,
            },
            GraphLayout::BinarySpacePartition(b) => RawLayout::BinarySpacePartition {
                min_room_size: b.min_room_size,
                max_depth: b.max_depth,
            },
            GraphLayout::FloodFill(f) => RawLayout::FloodFill {
                node_count: f.node_count,
                density: f.density,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_layouts_pass_their_own_validation() {
        let presets = ["dungeon", "tower", "temple", "cave", "plains"]
            .into_iter()
            .map(GraphLayout::for_biome)
            .chain([3, 10, 25, 31, 50, 55, 75, 200].into_iter().map(GraphLayout::for_node_count));

        for layout in presets {
            let revalidated = GraphLayout::try_from(RawLayout::from(layout));
            assert_eq!(revalidated, Ok(layout));
        }
    }

    #[test]
    fn bsp_depth_scales_with_requested_rooms() {
        let GraphLayout::BinarySpacePartition(bsp) = GraphLayout::for_node_count(50) else {
            panic!("expected bsp");
        };
        assert_eq!(bsp.max_depth(), 6);

        let GraphLayout::BinarySpacePartition(bsp) = GraphLayout::for_node_count(31) else {
            panic!("expected bsp");
        };
        assert_eq!(bsp.max_depth(), 5);
    }
}
