//! Monte Carlo pricing engines.

pub mod mc_engine;
pub mod mc_greeks;
pub mod paths;

pub use mc_engine::{MonteCarloEngine, VarianceReduction};
pub use mc_greeks::mc_greeks;
pub use paths::PathSet;
