//! Property-based checks of no-arbitrage relations.

use options_pricing::core::{OptionType, PricingEngine};
use options_pricing::engines::analytic::{
    bachelier_digital_price, bachelier_price, bs_digital_price, bs_price,
};
use options_pricing::engines::tree::TreeEngine;
use options_pricing::instruments::Payoff;
use options_pricing::market::MarketEnvironment;
use options_pricing::models::Model;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn black_scholes_put_call_parity(
        spot in 20.0..200.0_f64,
        strike in 20.0..200.0_f64,
        rate in -0.02..0.10_f64,
        q in 0.0..0.06_f64,
        vol in 0.05..0.8_f64,
        t in 0.05..3.0_f64,
    ) {
        let call = bs_price(OptionType::Call, spot, strike, rate, q, vol, t);
        let put = bs_price(OptionType::Put, spot, strike, rate, q, vol, t);
        let parity = spot * (-q * t).exp() - strike * (-rate * t).exp();
        prop_assert!((call - put - parity).abs() < 1e-9 * spot.max(strike));
    }

    #[test]
    fn bachelier_put_call_parity(
        spot in 50.0..150.0_f64,
        strike in 50.0..150.0_f64,
        rate in -0.02..0.08_f64,
        vol in 1.0..40.0_f64,
        t in 0.05..3.0_f64,
    ) {
        let call = bachelier_price(OptionType::Call, spot, strike, rate, 0.0, vol, t);
        let put = bachelier_price(OptionType::Put, spot, strike, rate, 0.0, vol, t);
        let parity = (-rate * t).exp() * (spot * (rate * t).exp() - strike);
        prop_assert!((call - put - parity).abs() < 1e-9 * spot.max(strike));
    }

    #[test]
    fn digital_call_plus_put_is_discounted_cash(
        spot in 50.0..150.0_f64,
        strike in 50.0..150.0_f64,
        rate in 0.0..0.08_f64,
        vol in 0.05..0.6_f64,
        t in 0.1..2.0_f64,
    ) {
        let df = (-rate * t).exp();
        let bs = bs_digital_price(OptionType::Call, spot, strike, 3.0, rate, 0.0, vol, t)
            + bs_digital_price(OptionType::Put, spot, strike, 3.0, rate, 0.0, vol, t);
        let normal_vol = vol * spot;
        let bachelier =
            bachelier_digital_price(OptionType::Call, spot, strike, 3.0, rate, 0.0, normal_vol, t)
                + bachelier_digital_price(OptionType::Put, spot, strike, 3.0, rate, 0.0, normal_vol, t);
        prop_assert!((bs - 3.0 * df).abs() < 1e-12);
        prop_assert!((bachelier - 3.0 * df).abs() < 1e-12);
    }

    #[test]
    fn call_monotone_in_spot_strike_and_vol(
        spot in 50.0..150.0_f64,
        strike in 50.0..150.0_f64,
        vol in 0.05..0.6_f64,
        t in 0.1..2.0_f64,
        bump in 0.5..5.0_f64,
    ) {
        let base = bs_price(OptionType::Call, spot, strike, 0.03, 0.0, vol, t);
        prop_assert!(bs_price(OptionType::Call, spot + bump, strike, 0.03, 0.0, vol, t) >= base);
        prop_assert!(bs_price(OptionType::Call, spot, strike + bump, 0.03, 0.0, vol, t) <= base);
        prop_assert!(bs_price(OptionType::Call, spot, strike, 0.03, 0.0, vol + 0.01 * bump, t) >= base);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn american_put_dominates_european_and_intrinsic(
        spot in 60.0..140.0_f64,
        vol in 0.1..0.5_f64,
        rate in 0.0..0.08_f64,
    ) {
        let market = MarketEnvironment::builder()
            .spot(spot)
            .rate(rate)
            .flat_vol(vol)
            .build()
            .expect("valid market");
        let engine = TreeEngine::binomial(100);
        let euro = engine
            .price(&Model::BlackScholes, &market, &Payoff::european_put(100.0, 1.0))
            .expect("european")
            .price;
        let amer = engine
            .price(&Model::BlackScholes, &market, &Payoff::american_put(100.0, 1.0))
            .expect("american")
            .price;
        prop_assert!(amer >= euro - 1e-12);
        prop_assert!(amer >= (100.0 - spot).max(0.0) - 1e-12);
    }

    #[test]
    fn tree_put_price_decreases_with_spot(
        spot in 60.0..140.0_f64,
        bump in 1.0..10.0_f64,
    ) {
        let price_at = |s: f64| {
            let market = MarketEnvironment::builder()
                .spot(s)
                .rate(0.04)
                .flat_vol(0.25)
                .build()
                .expect("valid market");
            TreeEngine::trinomial(100)
                .price(&Model::BlackScholes, &market, &Payoff::american_put(100.0, 1.0))
                .expect("tree")
                .price
        };
        prop_assert!(price_at(spot + bump) <= price_at(spot) + 1e-12);
    }
}
