use crate::core::OptionType;
use crate::market::MarketEnvironment;
use crate::math::normal_cdf;

/// Discretely monitored geometric-average Asian under Black-Scholes.
///
/// `fixings` are the monitoring times `t_1..t_n` (the spot at `t_0` is not
/// averaged); the payoff is discounted from `maturity`. Time-dependent vol
/// enters through `Cov(ln S_i, ln S_j) = w(min(t_i, t_j))`.
pub fn geometric_asian_price(
    option_type: OptionType,
    market: &MarketEnvironment,
    strike: f64,
    fixings: &[f64],
    maturity: f64,
) -> f64 {
    let df = market.discount(maturity);
    if fixings.is_empty() {
        return df * (option_type.sign() * (market.spot - strike)).max(0.0);
    }

    let n = fixings.len() as f64;
    let mu = market.carry();
    let mut mean = market.spot.ln();
    let mut var = 0.0;
    for (k, &t) in fixings.iter().enumerate() {
        let w = market.vol.total_variance(t);
        mean += (mu * t - 0.5 * w) / n;
        // Fixing k is the earlier date in 2(n-k)-1 ordered pairs (0-based k).
        var += w * (2.0 * (n - k as f64) - 1.0);
    }
    var /= n * n;

    let s = option_type.sign();
    if var <= 0.0 {
        return df * (s * (mean.exp() - strike)).max(0.0);
    }
    let sd = var.sqrt();
    let d1 = (mean - strike.ln() + var) / sd;
    let d2 = d1 - sd;
    df * s * ((mean + 0.5 * var).exp() * normal_cdf(s * d1) - strike * normal_cdf(s * d2))
}
