//! Lattice pricing engines.

pub mod engine;
pub mod lattice;

pub use engine::TreeEngine;
pub use lattice::TreeType;
