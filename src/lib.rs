//! Tower Floorgen - Socket-based Floor Generator
//!
//! This crate grows dungeon floors out of authored room templates:
//! - Room template library (weighted, filtered queries; RON/JSON assets)
//! - Bounds calculation (tight + padded volumes)
//! - Typed connection sockets, doors and blockades
//! - Spatial alignment and seam-tolerant collision solving
//! - Generation orchestrator (seeded, budgeted, chunkable)
//! - Bevy plugin driving generation across frames, with library hot-reload
//!
//! Same library + same config + same seed always yields the same floor.

pub mod bounds;
pub mod constants;
pub mod diagnostics;
pub mod generation;
pub mod geometry;
pub mod hotreload;
pub mod library;
pub mod logging;
pub mod sockets;
pub mod solver;
