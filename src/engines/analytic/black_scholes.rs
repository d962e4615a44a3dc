use crate::core::{Greeks, OptionType};
use crate::math::{normal_cdf, normal_pdf};

/// `(d1, d2)` for the lognormal closed forms.
///
/// With zero total volatility both collapse to `±∞` (or `0` exactly at the
/// forward) so the formulas below reduce to the deterministic limit.
#[inline]
pub(crate) fn d1_d2(
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> (f64, f64) {
    let sig_sqrt_t = vol * expiry.sqrt();
    let moneyness = (spot / strike).ln() + (rate - dividend_yield) * expiry;
    if sig_sqrt_t <= 0.0 {
        let d = if moneyness > 0.0 {
            f64::INFINITY
        } else if moneyness < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        };
        return (d, d);
    }
    let d1 = (moneyness + 0.5 * sig_sqrt_t * sig_sqrt_t) / sig_sqrt_t;
    (d1, d1 - sig_sqrt_t)
}

/// Black-Scholes-Merton price of a European vanilla option.
///
/// # Examples
/// ```
/// use options_pricing::core::OptionType;
/// use options_pricing::engines::analytic::bs_price;
///
/// let call = bs_price(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
/// assert!((call - 10.4506).abs() < 1e-4);
/// ```
#[inline]
pub fn bs_price(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    let df_r = (-rate * expiry).exp();
    let df_q = (-dividend_yield * expiry).exp();
    if vol * expiry.sqrt() <= 0.0 {
        return (option_type.sign() * (spot * df_q - strike * df_r)).max(0.0);
    }
    let (d1, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let s = option_type.sign();
    s * (spot * df_q * normal_cdf(s * d1) - strike * df_r * normal_cdf(s * d2))
}

/// Closed-form Black-Scholes-Merton Greeks.
///
/// Theta is the calendar decay `-∂V/∂T`; vega is per unit of volatility.
pub fn bs_greeks(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> Greeks {
    let s = option_type.sign();
    let df_r = (-rate * expiry).exp();
    let df_q = (-dividend_yield * expiry).exp();
    let sqrt_t = expiry.sqrt();
    let sig_sqrt_t = vol * sqrt_t;
    let (d1, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let nd1 = normal_pdf(d1);
    let cdf1 = normal_cdf(s * d1);
    let cdf2 = normal_cdf(s * d2);

    let (gamma, decay) = if sig_sqrt_t > 0.0 {
        (
            df_q * nd1 / (spot * sig_sqrt_t),
            spot * df_q * nd1 * vol / (2.0 * sqrt_t),
        )
    } else {
        (0.0, 0.0)
    };

    Greeks {
        delta: s * df_q * cdf1,
        gamma,
        vega: spot * df_q * nd1 * sqrt_t,
        theta: -decay
            + s * (dividend_yield * spot * df_q * cdf1 - rate * strike * df_r * cdf2),
        rho: s * strike * expiry * df_r * cdf2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn textbook_call_and_put() {
        let call = bs_price(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        let put = bs_price(OptionType::Put, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        assert_relative_eq!(call, 10.450_583_572_185_565, epsilon = 1e-10);
        assert_relative_eq!(put, 5.573_526_022_256_971, epsilon = 1e-10);
    }

    #[test]
    fn greeks_match_textbook_values() {
        let g = bs_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        assert_relative_eq!(g.delta, 0.636_830_651, epsilon = 1e-8);
        assert_relative_eq!(g.gamma, 0.018_762_017, epsilon = 1e-8);
        assert_relative_eq!(g.vega, 37.524_034_69, epsilon = 1e-6);
        assert_relative_eq!(g.theta, -6.414_027_5, epsilon = 1e-5);
        assert_relative_eq!(g.rho, 53.232_481_5, epsilon = 1e-5);
    }

    #[test]
    fn greeks_agree_with_finite_differences() {
        let (s, k, r, q, v, t) = (105.0, 100.0, 0.03, 0.01, 0.25, 0.75);
        for ot in [OptionType::Call, OptionType::Put] {
            let g = bs_greeks(ot, s, k, r, q, v, t);
            let h = 1e-4;
            let fd_delta = (bs_price(ot, s + h, k, r, q, v, t) - bs_price(ot, s - h, k, r, q, v, t))
                / (2.0 * h);
            let fd_vega = (bs_price(ot, s, k, r, q, v + h, t) - bs_price(ot, s, k, r, q, v - h, t))
                / (2.0 * h);
            let fd_theta = -(bs_price(ot, s, k, r, q, v, t + h)
                - bs_price(ot, s, k, r, q, v, t - h))
                / (2.0 * h);
            let fd_rho = (bs_price(ot, s, k, r + h, q, v, t) - bs_price(ot, s, k, r - h, q, v, t))
                / (2.0 * h);
            assert_relative_eq!(g.delta, fd_delta, epsilon = 1e-6);
            assert_relative_eq!(g.vega, fd_vega, epsilon = 1e-5);
            assert_relative_eq!(g.theta, fd_theta, epsilon = 1e-5);
            assert_relative_eq!(g.rho, fd_rho, epsilon = 1e-5);
        }
    }

    #[test]
    fn zero_vol_is_discounted_forward_intrinsic() {
        let call = bs_price(OptionType::Call, 100.0, 90.0, 0.05, 0.0, 0.0, 1.0);
        assert_relative_eq!(call, 100.0 - 90.0 * (-0.05_f64).exp(), epsilon = 1e-12);
        let g = bs_greeks(OptionType::Call, 100.0, 90.0, 0.05, 0.0, 0.0, 1.0);
        assert_eq!(g.delta, 1.0);
        assert_eq!(g.gamma, 0.0);
        assert_eq!(g.vega, 0.0);
        assert!(g.theta.is_finite());
    }
}
