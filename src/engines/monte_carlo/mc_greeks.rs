//! Simulation estimators for delta and vega.
//!
//! Vanilla payoffs use pathwise derivatives of `S_T`; cash-or-nothing
//! payoffs, whose payoff has no useful derivative, use likelihood-ratio
//! weights on the terminal density. Both need a flat volatility so the
//! terminal law has a single parameter `σ`.

use crate::core::{ExerciseStyle, Greek, GreekMap};
use crate::engines::monte_carlo::paths::PathSet;
use crate::instruments::{Payoff, PayoffKind};
use crate::market::MarketEnvironment;
use crate::models::Model;

/// Sensitivities of `S_T` and the standardised terminal normal.
#[derive(Debug, Clone, Copy)]
struct TerminalLaw {
    model: Model,
    spot: f64,
    vol: f64,
    forward: f64,
    /// Terminal stddev (log space for Black-Scholes).
    sd: f64,
    maturity: f64,
}

impl TerminalLaw {
    /// `∂S_T / ∂S_0` along a fixed path.
    #[inline]
    fn d_spot(&self, s_t: f64) -> f64 {
        match self.model {
            Model::BlackScholes => s_t / self.spot,
            Model::Bachelier => self.forward / self.spot,
        }
    }

    /// `∂S_T / ∂σ` along a fixed path.
    #[inline]
    fn d_vol(&self, s_t: f64) -> f64 {
        match self.model {
            Model::BlackScholes => {
                s_t * ((s_t / self.forward).ln() - 0.5 * self.sd * self.sd) / self.vol
            }
            Model::Bachelier => (s_t - self.forward) / self.vol,
        }
    }

    /// Standard normal driving `S_T`.
    #[inline]
    fn z(&self, s_t: f64) -> f64 {
        match self.model {
            Model::BlackScholes => ((s_t / self.forward).ln() + 0.5 * self.sd * self.sd) / self.sd,
            Model::Bachelier => (s_t - self.forward) / self.sd,
        }
    }

    /// Score `∂ ln p(S_T) / ∂S_0`.
    #[inline]
    fn delta_weight(&self, z: f64) -> f64 {
        match self.model {
            Model::BlackScholes => z / (self.spot * self.sd),
            Model::Bachelier => z * self.forward / (self.spot * self.sd),
        }
    }

    /// Score `∂ ln p(S_T) / ∂σ`.
    #[inline]
    fn vega_weight(&self, z: f64) -> f64 {
        match self.model {
            Model::BlackScholes => (z * z - 1.0) / self.vol - z * self.maturity.sqrt(),
            Model::Bachelier => (z * z - 1.0) / self.vol,
        }
    }
}

/// Pathwise or likelihood-ratio delta and vega for European terminal
/// payoffs under a flat volatility; `None` otherwise.
pub fn mc_greeks(
    model: Model,
    market: &MarketEnvironment,
    payoff: &Payoff,
    paths: &PathSet,
) -> Option<GreekMap> {
    if !matches!(payoff.style, ExerciseStyle::European) || payoff.is_path_dependent() {
        return None;
    }
    let vol = market.vol.flat()?;
    let maturity = payoff.maturity;
    let sd = model.terminal_stddev(market, maturity);
    if vol <= 0.0 || sd <= 0.0 {
        return None;
    }

    let law = TerminalLaw {
        model,
        spot: market.spot,
        vol,
        forward: model.forward(market, maturity),
        sd,
        maturity,
    };
    let df = market.discount(maturity);
    let n = paths.num_paths() as f64;
    let terminals = (0..paths.num_paths()).map(|i| paths.terminal(i));

    let (delta, vega) = match payoff.kind {
        PayoffKind::Vanilla {
            option_type,
            strike,
        } => {
            let sign = option_type.sign();
            terminals.fold((0.0, 0.0), |(d, v), s_t| {
                if sign * (s_t - strike) > 0.0 {
                    (d + sign * law.d_spot(s_t), v + sign * law.d_vol(s_t))
                } else {
                    (d, v)
                }
            })
        }
        PayoffKind::CashOrNothing { .. } => terminals.fold((0.0, 0.0), |(d, v), s_t| {
            let value = payoff.evaluate(s_t);
            if value == 0.0 {
                return (d, v);
            }
            let z = law.z(s_t);
            (d + value * law.delta_weight(z), v + value * law.vega_weight(z))
        }),
        PayoffKind::ArithmeticAsian { .. } => return None,
    };

    // Likelihood-ratio sums already carry the notional through `evaluate`.
    let scale = match payoff.kind {
        PayoffKind::Vanilla { .. } => df * payoff.notional / n,
        _ => df / n,
    };
    let mut greeks = GreekMap::new();
    greeks.insert(Greek::Delta, delta * scale);
    greeks.insert(Greek::Vega, vega * scale);
    Some(greeks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionType;
    use crate::engines::analytic::{bachelier_greeks, bs_digital_greeks, bs_greeks};
    use approx::assert_relative_eq;

    fn market(vol: f64) -> MarketEnvironment {
        MarketEnvironment::builder()
            .spot(100.0)
            .rate(0.05)
            .dividend_yield(0.01)
            .flat_vol(vol)
            .build()
            .unwrap()
    }

    #[test]
    fn pathwise_black_scholes_call() {
        let m = market(0.2);
        let paths = PathSet::generate(Model::BlackScholes, &m, 1.0, 200_000, 1, true, 17);
        let greeks = mc_greeks(Model::BlackScholes, &m, &Payoff::european_call(100.0, 1.0), &paths)
            .unwrap();
        let exact = bs_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.01, 0.2, 1.0);
        assert_relative_eq!(greeks[&Greek::Delta], exact.delta, max_relative = 1e-2);
        assert_relative_eq!(greeks[&Greek::Vega], exact.vega, max_relative = 2e-2);
    }

    #[test]
    fn pathwise_bachelier_put() {
        let m = market(15.0);
        let paths = PathSet::generate(Model::Bachelier, &m, 1.0, 200_000, 1, true, 23);
        let greeks =
            mc_greeks(Model::Bachelier, &m, &Payoff::european_put(103.0, 1.0), &paths).unwrap();
        let exact = bachelier_greeks(OptionType::Put, 100.0, 103.0, 0.05, 0.01, 15.0, 1.0);
        assert_relative_eq!(greeks[&Greek::Delta], exact.delta, max_relative = 2e-2);
        assert_relative_eq!(greeks[&Greek::Vega], exact.vega, max_relative = 3e-2);
    }

    #[test]
    fn likelihood_ratio_digital() {
        let m = market(0.25);
        let paths = PathSet::generate(Model::BlackScholes, &m, 1.0, 400_000, 1, true, 5);
        let payoff = Payoff::digital_call(100.0, 1.0, 1.0);
        let greeks = mc_greeks(Model::BlackScholes, &m, &payoff, &paths).unwrap();
        let exact = bs_digital_greeks(OptionType::Call, 100.0, 100.0, 1.0, 0.05, 0.01, 0.25, 1.0);
        assert_relative_eq!(greeks[&Greek::Delta], exact.delta, epsilon = 5e-4);
        assert_relative_eq!(greeks[&Greek::Vega], exact.vega, epsilon = 4e-2);
    }

    #[test]
    fn unavailable_for_american_or_zero_vol() {
        let m = market(0.2);
        let paths = PathSet::generate(Model::BlackScholes, &m, 1.0, 10, 1, false, 1);
        assert!(mc_greeks(Model::BlackScholes, &m, &Payoff::american_put(100.0, 1.0), &paths)
            .is_none());
        let flat = market(0.0);
        assert!(mc_greeks(Model::BlackScholes, &flat, &Payoff::european_put(100.0, 1.0), &paths)
            .is_none());
    }
}
