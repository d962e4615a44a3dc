use crate::core::{Greeks, OptionType};
use crate::engines::analytic::bachelier::NormalTerms;
use crate::engines::analytic::black_scholes::d1_d2;
use crate::math::{normal_cdf, normal_pdf};

/// Discounted digital payoff of the forward when no variance remains. A
/// forward sitting on the strike is out of the money, as at expiry.
fn deterministic_digital(option_type: OptionType, forward: f64, strike: f64, cash: f64, df: f64) -> f64 {
    let in_the_money = match option_type {
        OptionType::Call => forward > strike,
        OptionType::Put => forward < strike,
    };
    if in_the_money {
        cash * df
    } else {
        0.0
    }
}

/// Black-Scholes cash-or-nothing price.
///
/// # Examples
/// ```
/// use options_pricing::core::OptionType;
/// use options_pricing::engines::analytic::bs_digital_price;
///
/// let call = bs_digital_price(OptionType::Call, 100.0, 100.0, 1.0, 0.05, 0.0, 0.2, 1.0);
/// let put = bs_digital_price(OptionType::Put, 100.0, 100.0, 1.0, 0.05, 0.0, 0.2, 1.0);
/// assert!((call + put - (-0.05_f64).exp()).abs() < 1e-12);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn bs_digital_price(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    cash: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    let df = (-rate * expiry).exp();
    if vol * expiry.sqrt() <= 0.0 {
        let forward = spot * ((rate - dividend_yield) * expiry).exp();
        return deterministic_digital(option_type, forward, strike, cash, df);
    }
    let (_, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    cash * df * normal_cdf(option_type.sign() * d2)
}

#[allow(clippy::too_many_arguments)]
pub fn bs_digital_greeks(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    cash: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> Greeks {
    let s = option_type.sign();
    let price = bs_digital_price(option_type, spot, strike, cash, rate, dividend_yield, vol, expiry);
    let sqrt_t = expiry.sqrt();
    let sig_sqrt_t = vol * sqrt_t;
    if sig_sqrt_t <= 0.0 {
        return Greeks {
            theta: rate * price,
            rho: -expiry * price,
            ..Greeks::ZERO
        };
    }

    let (d1, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let weight = s * cash * (-rate * expiry).exp() * normal_pdf(d2);
    let dd2_dt = (rate - dividend_yield - 0.5 * vol * vol) / sig_sqrt_t - d2 / (2.0 * expiry);

    Greeks {
        delta: weight / (spot * sig_sqrt_t),
        gamma: -weight * d1 / (spot * spot * sig_sqrt_t * sig_sqrt_t),
        vega: -weight * d1 * sqrt_t / sig_sqrt_t,
        theta: rate * price - weight * dd2_dt,
        rho: -expiry * price + weight * expiry / sig_sqrt_t,
    }
}

/// Bachelier cash-or-nothing price.
#[allow(clippy::too_many_arguments)]
pub fn bachelier_digital_price(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    cash: f64,
    rate: f64,
    dividend_yield: f64,
    normal_vol: f64,
    expiry: f64,
) -> f64 {
    let t = NormalTerms::new(spot, strike, rate, dividend_yield, normal_vol, expiry);
    if t.sd <= 0.0 {
        return deterministic_digital(option_type, t.forward, strike, cash, t.df_r);
    }
    cash * t.df_r * normal_cdf(option_type.sign() * t.d)
}

#[allow(clippy::too_many_arguments)]
pub fn bachelier_digital_greeks(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    cash: f64,
    rate: f64,
    dividend_yield: f64,
    normal_vol: f64,
    expiry: f64,
) -> Greeks {
    let t = NormalTerms::new(spot, strike, rate, dividend_yield, normal_vol, expiry);
    let price =
        bachelier_digital_price(option_type, spot, strike, cash, rate, dividend_yield, normal_vol, expiry);
    if t.sd <= 0.0 {
        return Greeks {
            theta: rate * price,
            rho: -expiry * price,
            ..Greeks::ZERO
        };
    }

    let mu = rate - dividend_yield;
    let weight = option_type.sign() * cash * t.df_r * normal_pdf(t.d);
    let dd_dt = mu * t.forward / t.sd - t.d * t.dsd_dt / t.sd;
    let dd_dr = t.forward * expiry / t.sd - t.d * t.dsd_dmu / t.sd;

    Greeks {
        delta: weight * t.growth / t.sd,
        gamma: -weight * t.d * t.growth * t.growth / (t.sd * t.sd),
        vega: -weight * t.d * t.sqrt_g / t.sd,
        theta: rate * price - weight * dd_dt,
        rho: -expiry * price + weight * dd_dr,
    }
}
