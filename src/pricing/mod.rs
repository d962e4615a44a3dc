//! Method-agnostic entry points.
//!
//! [`price`] and [`greeks`] dispatch on a [`MethodConfig`], so the same
//! contract can be valued by every method family and the results compared.
//!
//! # Examples
//! ```
//! use options_pricing::instruments::Payoff;
//! use options_pricing::market::MarketEnvironment;
//! use options_pricing::models::Model;
//! use options_pricing::pricing::{price, MethodConfig, TreeConfig};
//!
//! let market = MarketEnvironment::builder()
//!     .spot(100.0)
//!     .rate(0.05)
//!     .flat_vol(0.2)
//!     .build()
//!     .unwrap();
//! let payoff = Payoff::european_call(100.0, 1.0);
//!
//! let exact = price(&Model::BlackScholes, &market, &payoff, &MethodConfig::Analytic).unwrap();
//! let tree = price(
//!     &Model::BlackScholes,
//!     &market,
//!     &payoff,
//!     &MethodConfig::Tree(TreeConfig::binomial(500)),
//! )
//! .unwrap();
//! assert!((tree.price - exact.price).abs() < 0.01);
//! ```

pub mod config;

pub use config::{MethodConfig, MonteCarloConfig, PdeConfig, TreeConfig};

use crate::core::{Greek, GreekMap, PricingEngine, PricingError, PricingResult};
use crate::engines::analytic::AnalyticEngine;
use crate::engines::monte_carlo::MonteCarloEngine;
use crate::engines::pde::CrankNicolsonEngine;
use crate::engines::tree::TreeEngine;
use crate::greeks::{bump_and_revalue, BumpConfig};
use crate::instruments::Payoff;
use crate::market::MarketEnvironment;
use crate::math::resolve_seed;
use crate::models::Model;

/// Prices `payoff` with the method described by `config`.
pub fn price(
    model: &Model,
    market: &MarketEnvironment,
    payoff: &Payoff,
    config: &MethodConfig,
) -> Result<PricingResult, PricingError> {
    match config {
        MethodConfig::Analytic => AnalyticEngine::new().price(model, market, payoff),
        MethodConfig::Tree(c) => TreeEngine::from(*c).price(model, market, payoff),
        MethodConfig::Pde(c) => CrankNicolsonEngine::from(*c).price(model, market, payoff),
        MethodConfig::MonteCarlo(c) => MonteCarloEngine::from(*c).price(model, market, payoff),
    }
}

/// Greeks with the default bump sizes. See [`greeks_with_bumps`].
pub fn greeks(
    model: &Model,
    market: &MarketEnvironment,
    payoff: &Payoff,
    config: &MethodConfig,
    which: &[Greek],
) -> Result<GreekMap, PricingError> {
    greeks_with_bumps(model, market, payoff, config, which, &BumpConfig::default())
}

/// Requested Greeks, taken from the engine where it produces them and
/// completed by bump-and-revalue otherwise.
///
/// Simulation configs are pinned to one seed first, so every revaluation
/// reuses the same random numbers.
pub fn greeks_with_bumps(
    model: &Model,
    market: &MarketEnvironment,
    payoff: &Payoff,
    config: &MethodConfig,
    which: &[Greek],
    bumps: &BumpConfig,
) -> Result<GreekMap, PricingError> {
    let config = match *config {
        MethodConfig::MonteCarlo(mc) => MethodConfig::MonteCarlo(MonteCarloConfig {
            seed: Some(resolve_seed(mc.seed)),
            ..mc
        }),
        other => other,
    };

    let engine_greeks = price(model, market, payoff, &config)?
        .greeks
        .unwrap_or_default();
    let mut out: GreekMap = which
        .iter()
        .filter_map(|g| engine_greeks.get(g).map(|&v| (*g, v)))
        .collect();

    let missing: Vec<Greek> = which
        .iter()
        .copied()
        .filter(|g| !out.contains_key(g))
        .collect();
    if !missing.is_empty() {
        tracing::debug!(
            method = config.name(),
            missing = ?missing,
            "completing greeks by bump-and-revalue"
        );
        let pricer = |m: &Model, mkt: &MarketEnvironment, p: &Payoff| {
            price(m, mkt, p, &config).map(|r| r.price)
        };
        out.extend(bump_and_revalue(pricer, model, market, payoff, bumps, &missing)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionType;
    use crate::engines::analytic::bs_greeks;
    use approx::assert_relative_eq;

    fn market() -> MarketEnvironment {
        MarketEnvironment::builder()
            .spot(100.0)
            .rate(0.05)
            .flat_vol(0.2)
            .build()
            .unwrap()
    }

    #[test]
    fn analytic_greeks_come_straight_from_engine() {
        let g = greeks(
            &Model::BlackScholes,
            &market(),
            &Payoff::european_call(100.0, 1.0),
            &MethodConfig::Analytic,
            &Greek::ALL,
        )
        .unwrap();
        let exact = bs_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        assert_eq!(g[&Greek::Delta], exact.delta);
        assert_eq!(g[&Greek::Rho], exact.rho);
    }

    #[test]
    fn tree_greeks_fill_vega_and_rho_by_bumping() {
        let exact = bs_greeks(OptionType::Put, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        let g = greeks(
            &Model::BlackScholes,
            &market(),
            &Payoff::european_put(100.0, 1.0),
            &MethodConfig::Tree(TreeConfig::trinomial(400)),
            &Greek::ALL,
        )
        .unwrap();
        assert_eq!(g.len(), 5);
        assert_relative_eq!(g[&Greek::Delta], exact.delta, epsilon = 5e-3);
        assert_relative_eq!(g[&Greek::Vega], exact.vega, max_relative = 2e-2);
        assert_relative_eq!(g[&Greek::Rho], exact.rho, max_relative = 2e-2);
    }

    #[test]
    fn monte_carlo_greeks_are_reproducible() {
        let config = MethodConfig::MonteCarlo(MonteCarloConfig::new(20_000, 1).with_seed(11));
        let payoff = Payoff::european_call(100.0, 1.0);
        let which = [Greek::Delta, Greek::Gamma, Greek::Vega];
        let a = greeks(&Model::BlackScholes, &market(), &payoff, &config, &which).unwrap();
        let b = greeks(&Model::BlackScholes, &market(), &payoff, &config, &which).unwrap();
        assert_eq!(a, b);
        assert!(a[&Greek::Gamma].is_finite());
    }
}
