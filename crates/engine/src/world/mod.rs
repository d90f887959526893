pub mod id;
pub mod level;

pub use level::ChunkLevel;
