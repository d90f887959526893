//! Procedural world topology.
//!
//! Everything in this crate is pure and synchronous: a layout plus a seed
//! always produces the same graph. Storage, caching, and per-actor state live
//! in `labyrinth-world`.

pub mod graph;
pub mod layout;
pub mod world;
