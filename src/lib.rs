//! Bit-packed cell grid, chunked activity tracking, and deterministic
//! reaction/movement stepping for a falling-sand cellular automaton.
//!
//! [`Grid`] is the single entry point: allocate one with [`Grid::new_empty`],
//! configure materials with [`Grid::init_materials`]/[`Grid::add_material`]
//! (or [`MaterialTable::from_bundle_json`] plus a fresh [`Grid`]), and advance
//! the simulation with [`Grid::step_manual`].

mod cell;
mod chunks;
mod error;
mod grid;
mod materials;
mod perf;
mod rng;
mod step;

pub use cell::Cell;
pub use error::MaterialTableError;
pub use grid::Grid;
pub use materials::{CollisionClass, Material, MaterialTable, MovementClass};
pub use perf::StepStats;
pub use rng::Rng;
