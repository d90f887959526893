//! World generation on top of `labyrinth-engine`.
//!
//! Chunks form a strict hierarchy (world, region, zone, subzone, space).
//! Subzones are generated lazily as room graphs, persisted through a
//! [`repository::ChunkRepository`], and memoized in a shared
//! [`cache::GenerationCache`] so concurrent actors never generate the same
//! subzone twice.

pub mod cache;
pub mod config;
pub mod describer;
pub mod generator;
pub mod metrics;
pub mod navigation;
pub mod repository;
