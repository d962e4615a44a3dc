//! Finite-difference PDE engines.

pub mod crank_nicolson;
mod fd_common;

pub use crank_nicolson::CrankNicolsonEngine;
