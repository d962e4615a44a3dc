//! Option pricing and risk sensitivities across four method families:
//! closed-form analytic formulas, recombining lattices, a Crank-Nicolson PDE
//! solver and Monte Carlo simulation (with Longstaff-Schwartz regression for
//! early exercise).
//!
//! Every engine implements [`core::PricingEngine`] over the same inputs, a
//! [`models::Model`] (Black-Scholes or Bachelier), a
//! [`market::MarketEnvironment`] and an [`instruments::Payoff`], and returns a
//! [`core::PricingResult`]. For European payoffs under Black-Scholes all
//! methods converge to the analytic limit, which makes the crate useful for
//! comparing accuracy and convergence.
//!
//! References used across modules include:
//! - Hull, *Options, Futures, and Other Derivatives* (11th ed.), Ch. 13, 19, 21.
//! - Glasserman (2004) for Monte Carlo estimators and Greeks.
//! - Longstaff and Schwartz (2001) for least-squares exercise.
//! - Wilmott, Howison and Dewynne (1995) for finite differences.
//!
//! Numerical considerations:
//! - Tree and PDE engines expose step counts; convergence is first/second
//!   order in the step size respectively.
//! - Monte Carlo engines report a standard error and take an explicit seed;
//!   every path owns its own random stream, so results are reproducible.
//!
//! # Feature Flags
//! - `parallel`: Rayon-powered path generation and in-the-money scans.
//!
//! # Quick Start
//! Price a Black-Scholes call with every method:
//! ```rust
//! use options_pricing::instruments::Payoff;
//! use options_pricing::market::MarketEnvironment;
//! use options_pricing::models::Model;
//! use options_pricing::pricing::{price, MethodConfig, MonteCarloConfig, PdeConfig, TreeConfig};
//!
//! let market = MarketEnvironment::builder()
//!     .spot(100.0)
//!     .rate(0.05)
//!     .flat_vol(0.20)
//!     .build()
//!     .unwrap();
//! let call = Payoff::european_call(100.0, 1.0);
//!
//! for config in [
//!     MethodConfig::Analytic,
//!     MethodConfig::Tree(TreeConfig::binomial(500)),
//!     MethodConfig::Pde(PdeConfig::new(200, 200)),
//!     MethodConfig::MonteCarlo(MonteCarloConfig::new(20_000, 1).with_seed(42)),
//! ] {
//!     let px = price(&Model::BlackScholes, &market, &call, &config).unwrap().price;
//!     assert!(px > 10.0 && px < 11.0);
//! }
//! ```
//!
//! Compute Greeks:
//! ```rust
//! use options_pricing::core::Greek;
//! use options_pricing::instruments::Payoff;
//! use options_pricing::market::MarketEnvironment;
//! use options_pricing::models::Model;
//! use options_pricing::pricing::{greeks, MethodConfig};
//!
//! let market = MarketEnvironment::builder()
//!     .spot(100.0)
//!     .rate(0.05)
//!     .flat_vol(0.20)
//!     .build()
//!     .unwrap();
//! let g = greeks(
//!     &Model::BlackScholes,
//!     &market,
//!     &Payoff::european_put(100.0, 1.0),
//!     &MethodConfig::Analytic,
//!     &Greek::ALL,
//! )
//! .unwrap();
//! assert!(g[&Greek::Delta] < 0.0 && g[&Greek::Gamma] > 0.0);
//! ```
//!
//! Work with day-count conventions:
//! ```rust
//! use chrono::NaiveDate;
//! use options_pricing::time::{year_fraction, DayCount};
//!
//! let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//! let yf = year_fraction(start, end, DayCount::Act365);
//! assert!((yf - 1.0).abs() < 1.0e-12);
//! ```

pub mod core;
pub mod engines;
pub mod greeks;
pub mod instruments;
pub mod market;
pub mod math;
pub mod models;
pub mod pricing;
pub mod time;

/// Common imports for ergonomic usage.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::engines::analytic::AnalyticEngine;
    pub use crate::engines::lsm::LongstaffSchwartz;
    pub use crate::engines::monte_carlo::{MonteCarloEngine, VarianceReduction};
    pub use crate::engines::pde::CrankNicolsonEngine;
    pub use crate::engines::tree::{TreeEngine, TreeType};
    pub use crate::instruments::*;
    pub use crate::market::*;
    pub use crate::models::Model;
    pub use crate::pricing::{greeks, price, MethodConfig};
}
