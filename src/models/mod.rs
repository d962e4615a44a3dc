//! Stochastic models for the underlying.
//!
//! A [`Model`] together with a [`MarketEnvironment`] fully determines the
//! risk-neutral dynamics. The market carries the volatility: a Black vol for
//! [`Model::BlackScholes`], an absolute normal vol for [`Model::Bachelier`].
//!
//! Both variants share the drift `μ = r - q`:
//! - Black-Scholes: `dS = μ S dt + σ(t) S dW`
//! - Bachelier: `dS = μ S dt + σ_N(t) dW`, so `S_T` is Gaussian with mean
//!   `S_0 e^{μT}` and variance `∫ σ_N(u)² e^{2μ(T-u)} du`.

use serde::{Deserialize, Serialize};

use crate::market::MarketEnvironment;

/// Drift and half-variance of the pricing PDE at `(s, t)`:
/// `V_t + drift V_S + half_variance V_SS - r V = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdeCoefficients {
    pub drift: f64,
    pub half_variance: f64,
}

/// Supported diffusion models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    /// Lognormal dynamics.
    BlackScholes,
    /// Normal (arithmetic) dynamics.
    Bachelier,
}

impl Model {
    pub fn name(self) -> &'static str {
        match self {
            Self::BlackScholes => "black_scholes",
            Self::Bachelier => "bachelier",
        }
    }

    /// Risk-neutral forward `S_0 e^{(r-q)t}`.
    #[inline]
    pub fn forward(self, market: &MarketEnvironment, t: f64) -> f64 {
        market.spot * (market.carry() * t).exp()
    }

    /// Variance of the transition from `t0` to `t1`.
    ///
    /// Log-price variance for Black-Scholes, price variance of
    /// `S(t1) | S(t0)` for Bachelier.
    pub fn transition_variance(self, market: &MarketEnvironment, t0: f64, t1: f64) -> f64 {
        match self {
            Self::BlackScholes => market.vol.forward_variance(t0, t1),
            Self::Bachelier => discounted_variance(market, t0, t1, 2.0 * market.carry()),
        }
    }

    /// Terminal standard deviation at `t` (log space for Black-Scholes, price
    /// space for Bachelier).
    #[inline]
    pub fn terminal_stddev(self, market: &MarketEnvironment, t: f64) -> f64 {
        self.transition_variance(market, 0.0, t).max(0.0).sqrt()
    }

    /// Exact draw of `S_t` from a standard normal `z`.
    #[inline]
    pub fn terminal_sample(self, market: &MarketEnvironment, t: f64, z: f64) -> f64 {
        self.step(market, market.spot, 0.0, t, z)
    }

    /// Exact one-step transition `S(t0) = s -> S(t1)`.
    #[inline]
    pub fn step(self, market: &MarketEnvironment, s: f64, t0: f64, t1: f64, z: f64) -> f64 {
        let dt = t1 - t0;
        let var = self.transition_variance(market, t0, t1);
        match self {
            Self::BlackScholes => s * (market.carry() * dt - 0.5 * var + var.sqrt() * z).exp(),
            Self::Bachelier => s * (market.carry() * dt).exp() + var.sqrt() * z,
        }
    }

    /// PDE coefficients at `(s, t)` using the instantaneous volatility.
    #[inline]
    pub fn pde_coefficients(self, market: &MarketEnvironment, s: f64, t: f64) -> PdeCoefficients {
        let vol = market.vol.instantaneous_vol(t);
        let half_variance = match self {
            Self::BlackScholes => 0.5 * vol * vol * s * s,
            Self::Bachelier => 0.5 * vol * vol,
        };
        PdeCoefficients {
            drift: market.carry() * s,
            half_variance,
        }
    }
}

/// `∫_{t0}^{t1} σ(u)² e^{k (t1 - u)} du`, exact for piecewise-constant
/// instantaneous variance between the vol breakpoints.
pub(crate) fn discounted_variance(market: &MarketEnvironment, t0: f64, t1: f64, k: f64) -> f64 {
    if t1 <= t0 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut a = t0;
    let cuts = market
        .vol
        .breakpoints()
        .iter()
        .copied()
        .filter(|&b| b > t0 && b < t1)
        .chain(std::iter::once(t1));
    for b in cuts {
        let seg_var = market.vol.forward_variance(a, b);
        if seg_var > 0.0 {
            let inst = seg_var / (b - a);
            total += inst * exp_weight(k, t1 - b, b - a);
        }
        a = b;
    }
    total
}

/// `∫_a^b e^{k (t1 - u)} du` written in terms of `tail = t1 - b` and `len = b - a`.
#[inline]
fn exp_weight(k: f64, tail: f64, len: f64) -> f64 {
    if (k * len).abs() < 1e-12 {
        (k * tail).exp() * len
    } else {
        (k * tail).exp() * (k * len).exp_m1() / k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::VolTermStructure;
    use approx::assert_relative_eq;

    fn market(rate: f64, vol: f64) -> MarketEnvironment {
        MarketEnvironment::builder()
            .spot(100.0)
            .rate(rate)
            .dividend_yield(0.01)
            .flat_vol(vol)
            .build()
            .unwrap()
    }

    #[test]
    fn bachelier_variance_matches_closed_form() {
        let m = market(0.05, 10.0);
        let mu = 0.04;
        let expected = 100.0 * ((2.0 * mu * 2.0_f64).exp() - 1.0) / (2.0 * mu);
        assert_relative_eq!(
            Model::Bachelier.transition_variance(&m, 0.0, 2.0),
            expected,
            max_relative = 1e-12
        );
    }

    #[test]
    fn bachelier_variance_zero_drift_limit() {
        let m = MarketEnvironment::builder()
            .spot(100.0)
            .flat_vol(8.0)
            .build()
            .unwrap();
        assert_relative_eq!(
            Model::Bachelier.transition_variance(&m, 0.25, 1.0),
            64.0 * 0.75,
            max_relative = 1e-12
        );
    }

    #[test]
    fn bachelier_variance_splits_across_steps() {
        let ts = VolTermStructure::new(vec![(0.5, 8.0), (1.0, 12.0)]).unwrap();
        let m = MarketEnvironment::builder()
            .spot(100.0)
            .rate(0.03)
            .vol_term_structure(ts)
            .build()
            .unwrap();
        let mu2 = 2.0 * m.carry();
        let whole = Model::Bachelier.transition_variance(&m, 0.0, 1.0);
        let split = Model::Bachelier.transition_variance(&m, 0.0, 0.7) * (mu2 * 0.3).exp()
            + Model::Bachelier.transition_variance(&m, 0.7, 1.0);
        assert_relative_eq!(whole, split, max_relative = 1e-12);
    }

    #[test]
    fn zero_vol_step_is_deterministic_forward() {
        let m = market(0.05, 0.0);
        for model in [Model::BlackScholes, Model::Bachelier] {
            let s = model.terminal_sample(&m, 1.0, 2.5);
            assert_relative_eq!(s, model.forward(&m, 1.0), max_relative = 1e-14);
        }
    }

    #[test]
    fn pde_coefficients_by_model() {
        let m = market(0.05, 0.2);
        let bs = Model::BlackScholes.pde_coefficients(&m, 50.0, 0.5);
        assert_relative_eq!(bs.drift, 0.04 * 50.0);
        assert_relative_eq!(bs.half_variance, 0.5 * 0.04 * 2500.0, max_relative = 1e-12);
        let n = Model::Bachelier.pde_coefficients(&m, 50.0, 0.5);
        assert_relative_eq!(n.half_variance, 0.02, max_relative = 1e-12);
    }
}
