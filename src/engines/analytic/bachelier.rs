//! Normal-model closed forms.
//!
//! Under `dS = μ S dt + σ_N dW` the terminal price is Gaussian with mean
//! `F = S e^{μT}` and variance `σ_N² g(μ, T)`, `g = (e^{2μT} - 1) / (2μ)`.
//! With zero carry this is the classic `σ_N² T`.

use crate::core::{Greeks, OptionType};
use crate::math::{normal_cdf, normal_pdf};

/// `(g, ∂g/∂μ)` of the variance factor, with the small-`μT` series.
#[inline]
pub(crate) fn variance_factor(mu: f64, expiry: f64) -> (f64, f64) {
    let x = mu * expiry;
    if x.abs() < 1e-6 {
        let g = expiry * (1.0 + x + 2.0 * x * x / 3.0);
        let dg = expiry * expiry * (1.0 + 4.0 * x / 3.0);
        return (g, dg);
    }
    let em1 = (2.0 * x).exp_m1();
    let g = em1 / (2.0 * mu);
    let dg = expiry * (2.0 * x).exp() / mu - em1 / (2.0 * mu * mu);
    (g, dg)
}

/// Standardised moneyness `(F - K) / sd` with the zero-variance limit.
#[inline]
pub(crate) fn normal_d(forward: f64, strike: f64, sd: f64) -> f64 {
    if sd > 0.0 {
        (forward - strike) / sd
    } else if forward > strike {
        f64::INFINITY
    } else if forward < strike {
        f64::NEG_INFINITY
    } else {
        0.0
    }
}

/// Shared state of the normal-model formulas.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NormalTerms {
    pub forward: f64,
    pub sd: f64,
    pub d: f64,
    pub df_r: f64,
    pub growth: f64,
    pub sqrt_g: f64,
    /// `∂sd/∂T`.
    pub dsd_dt: f64,
    /// `∂sd/∂μ`.
    pub dsd_dmu: f64,
}

impl NormalTerms {
    pub(crate) fn new(
        spot: f64,
        strike: f64,
        rate: f64,
        dividend_yield: f64,
        normal_vol: f64,
        expiry: f64,
    ) -> Self {
        let mu = rate - dividend_yield;
        let growth = (mu * expiry).exp();
        let forward = spot * growth;
        let (g, dg) = variance_factor(mu, expiry);
        let sqrt_g = g.max(0.0).sqrt();
        let sd = normal_vol * sqrt_g;
        let (dsd_dt, dsd_dmu) = if sd > 0.0 {
            let var = normal_vol * normal_vol;
            (
                var * growth * growth / (2.0 * sd),
                var * dg / (2.0 * sd),
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            forward,
            sd,
            d: normal_d(forward, strike, sd),
            df_r: (-rate * expiry).exp(),
            growth,
            sqrt_g,
            dsd_dt,
            dsd_dmu,
        }
    }
}

/// Bachelier price of a European vanilla option.
///
/// `normal_vol` is the absolute (price-unit) volatility.
///
/// # Examples
/// ```
/// use options_pricing::core::OptionType;
/// use options_pricing::engines::analytic::bachelier_price;
///
/// // ATM, zero carry: sd * n(0).
/// let call = bachelier_price(OptionType::Call, 100.0, 100.0, 0.0, 0.0, 20.0, 1.0);
/// assert!((call - 20.0 * 0.398_942_280_4).abs() < 1e-8);
/// ```
pub fn bachelier_price(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    normal_vol: f64,
    expiry: f64,
) -> f64 {
    let t = NormalTerms::new(spot, strike, rate, dividend_yield, normal_vol, expiry);
    let s = option_type.sign();
    let intrinsic = s * (t.forward - strike);
    if t.sd <= 0.0 {
        return t.df_r * intrinsic.max(0.0);
    }
    t.df_r * (intrinsic * normal_cdf(s * t.d) + t.sd * normal_pdf(t.d))
}

/// Closed-form Bachelier Greeks (theta is `-∂V/∂T`, vega per unit normal vol).
pub fn bachelier_greeks(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    normal_vol: f64,
    expiry: f64,
) -> Greeks {
    let t = NormalTerms::new(spot, strike, rate, dividend_yield, normal_vol, expiry);
    let s = option_type.sign();
    let mu = rate - dividend_yield;
    let price = bachelier_price(option_type, spot, strike, rate, dividend_yield, normal_vol, expiry);
    let nd = normal_pdf(t.d);
    // ∂U/∂F of the undiscounted payoff expectation.
    let du_df = s * normal_cdf(s * t.d);
    let du_dsd = if t.sd > 0.0 { nd } else { 0.0 };

    Greeks {
        delta: t.df_r * du_df * t.growth,
        gamma: if t.sd > 0.0 {
            t.df_r * nd * t.growth * t.growth / t.sd
        } else {
            0.0
        },
        vega: t.df_r * nd * t.sqrt_g,
        theta: rate * price - t.df_r * (du_df * mu * t.forward + du_dsd * t.dsd_dt),
        rho: -expiry * price + t.df_r * (du_df * t.forward * expiry + du_dsd * t.dsd_dmu),
    }
}
