//! # histotile parallel
//!
//! Scheduling for per-object units of work.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, global Rayon pool or a dedicated pool
//! - `run_units`: isolated units with cancellation and per-unit outcomes
//! - `TilePlan`: splitting large regions of interest into tiles

pub mod runner;
pub mod strategy;
pub mod tiled;

pub use runner::{run_units, RunSummary, UnitOutcome};
#[cfg(feature = "parallel")]
pub use strategy::num_cpus;
pub use strategy::{ParallelStrategy, ProcessingMode};
pub use tiled::{Tile, TileIterator, TilePlan, DEFAULT_TILE_SIZE};
