//! Serializable method settings, one struct per engine family.
//!
//! [`MethodConfig`] is the tagged union accepted by
//! [`price`](crate::pricing::price) and [`greeks`](crate::pricing::greeks),
//! and is what a JSON run file deserializes into:
//!
//! ```json
//! { "method": "pde", "price_steps": 300, "time_steps": 200 }
//! ```
//!
//! Omitted fields take the defaults of the matching engine. Choosing a
//! method: `analytic` for European vanilla, digital and geometric payoffs;
//! `tree` or `pde` for early exercise; `monte_carlo` for arithmetic Asians.

use serde::{Deserialize, Serialize};

use crate::core::{from_json, PricingError};
use crate::engines::monte_carlo::{MonteCarloEngine, VarianceReduction};
use crate::engines::pde::CrankNicolsonEngine;
use crate::engines::tree::{TreeEngine, TreeType};

/// Lattice settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub steps: usize,
    pub tree_type: TreeType,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            steps: 500,
            tree_type: TreeType::Binomial,
        }
    }
}

impl TreeConfig {
    pub fn binomial(steps: usize) -> Self {
        Self {
            steps,
            tree_type: TreeType::Binomial,
        }
    }

    pub fn trinomial(steps: usize) -> Self {
        Self {
            steps,
            tree_type: TreeType::Trinomial,
        }
    }
}

impl From<TreeConfig> for TreeEngine {
    fn from(config: TreeConfig) -> Self {
        TreeEngine::new(config.steps).with_tree_type(config.tree_type)
    }
}

/// Crank-Nicolson grid settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdeConfig {
    pub price_steps: usize,
    pub time_steps: usize,
    /// Half-width of the price domain in terminal standard deviations.
    pub std_devs: f64,
    pub rannacher_steps: usize,
}

impl Default for PdeConfig {
    fn default() -> Self {
        Self {
            price_steps: 200,
            time_steps: 200,
            std_devs: 5.0,
            rannacher_steps: 0,
        }
    }
}

impl PdeConfig {
    pub fn new(price_steps: usize, time_steps: usize) -> Self {
        Self {
            price_steps,
            time_steps,
            ..Self::default()
        }
    }
}

impl From<PdeConfig> for CrankNicolsonEngine {
    fn from(config: PdeConfig) -> Self {
        CrankNicolsonEngine::new(config.price_steps, config.time_steps)
            .with_std_devs(config.std_devs)
            .with_rannacher_steps(config.rannacher_steps)
    }
}

/// Simulation settings, shared by the European and least-squares engines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub paths: usize,
    pub time_steps: usize,
    pub variance_reduction: VarianceReduction,
    pub seed: Option<u64>,
    /// Regression degree for early exercise.
    pub basis_degree: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            paths: 100_000,
            time_steps: 50,
            variance_reduction: VarianceReduction::None,
            seed: None,
            basis_degree: 2,
        }
    }
}

impl MonteCarloConfig {
    pub fn new(paths: usize, time_steps: usize) -> Self {
        Self {
            paths,
            time_steps,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_variance_reduction(mut self, variance_reduction: VarianceReduction) -> Self {
        self.variance_reduction = variance_reduction;
        self
    }
}

impl From<MonteCarloConfig> for MonteCarloEngine {
    fn from(config: MonteCarloConfig) -> Self {
        MonteCarloEngine {
            paths: config.paths,
            time_steps: config.time_steps,
            variance_reduction: config.variance_reduction,
            seed: config.seed,
            basis_degree: config.basis_degree,
        }
    }
}

/// Pricing method and its settings.
///
/// Serialized with a `method` tag:
/// ```json
/// { "method": "monte_carlo", "paths": 50000, "time_steps": 50, "seed": 42 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodConfig {
    Analytic,
    Tree(TreeConfig),
    Pde(PdeConfig),
    MonteCarlo(MonteCarloConfig),
}

impl MethodConfig {
    /// Parses a method configuration from JSON.
    ///
    /// # Errors
    /// Returns [`PricingError::Serialization`] for malformed payloads.
    pub fn from_json(payload: &str) -> Result<Self, PricingError> {
        from_json(payload)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Analytic => "analytic",
            Self::Tree(_) => "tree",
            Self::Pde(_) => "pde",
            Self::MonteCarlo(_) => "monte_carlo",
        }
    }
}
