use crate::core::{DiagKey, Diagnostics, Greeks, PricingEngine, PricingError, PricingResult};
use crate::engines::analytic::{
    bachelier_digital_greeks, bachelier_digital_price, bachelier_greeks, bachelier_price,
    bs_digital_greeks, bs_digital_price, bs_greeks, bs_price,
};
use crate::instruments::{Payoff, PayoffKind};
use crate::market::MarketEnvironment;
use crate::models::Model;

/// Closed-form engine for European vanilla and cash-or-nothing payoffs under
/// both models.
///
/// Time-dependent volatility is collapsed to its average over the life of
/// the option. The result always carries the full Greek set.
///
/// # Examples
/// ```
/// use options_pricing::core::PricingEngine;
/// use options_pricing::engines::analytic::AnalyticEngine;
/// use options_pricing::instruments::Payoff;
/// use options_pricing::market::MarketEnvironment;
/// use options_pricing::models::Model;
///
/// let market = MarketEnvironment::builder()
///     .spot(100.0)
///     .rate(0.05)
///     .flat_vol(0.2)
///     .build()
///     .unwrap();
/// let result = AnalyticEngine::new()
///     .price(&Model::BlackScholes, &market, &Payoff::european_call(100.0, 1.0))
///     .unwrap();
/// assert!((result.price - 10.4506).abs() < 1e-4);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEngine;

impl AnalyticEngine {
    pub fn new() -> Self {
        Self
    }

    /// Price and Greeks per unit notional.
    fn unit_price_and_greeks(
        model: Model,
        market: &MarketEnvironment,
        payoff: &Payoff,
        vol: f64,
    ) -> Result<(f64, Greeks), PricingError> {
        let (s, r, q, t) = (
            market.spot,
            market.rate,
            market.dividend_yield,
            payoff.maturity,
        );
        let out = match (model, &payoff.kind) {
            (
                Model::BlackScholes,
                PayoffKind::Vanilla {
                    option_type,
                    strike,
                },
            ) => (
                bs_price(*option_type, s, *strike, r, q, vol, t),
                bs_greeks(*option_type, s, *strike, r, q, vol, t),
            ),
            (
                Model::BlackScholes,
                PayoffKind::CashOrNothing {
                    option_type,
                    strike,
                    cash,
                },
            ) => (
                bs_digital_price(*option_type, s, *strike, *cash, r, q, vol, t),
                bs_digital_greeks(*option_type, s, *strike, *cash, r, q, vol, t),
            ),
            (
                Model::Bachelier,
                PayoffKind::Vanilla {
                    option_type,
                    strike,
                },
            ) => (
                bachelier_price(*option_type, s, *strike, r, q, vol, t),
                bachelier_greeks(*option_type, s, *strike, r, q, vol, t),
            ),
            (
                Model::Bachelier,
                PayoffKind::CashOrNothing {
                    option_type,
                    strike,
                    cash,
                },
            ) => (
                bachelier_digital_price(*option_type, s, *strike, *cash, r, q, vol, t),
                bachelier_digital_greeks(*option_type, s, *strike, *cash, r, q, vol, t),
            ),
            (model, PayoffKind::ArithmeticAsian { .. }) => {
                return Err(PricingError::UnsupportedCombination(format!(
                    "no closed form for arithmetic Asian under {}",
                    model.name()
                )));
            }
        };
        Ok(out)
    }
}

impl PricingEngine for AnalyticEngine {
    fn price(
        &self,
        model: &Model,
        market: &MarketEnvironment,
        payoff: &Payoff,
    ) -> Result<PricingResult, PricingError> {
        payoff.validate()?;
        market.validate()?;
        if payoff.style.allows_early_exercise() {
            return Err(PricingError::UnsupportedCombination(
                "analytic engine supports European exercise only".to_string(),
            ));
        }

        let vol = market.vol(payoff.maturity);
        tracing::debug!(
            model = model.name(),
            vol,
            maturity = payoff.maturity,
            "analytic pricing"
        );
        let (unit_price, greeks) = Self::unit_price_and_greeks(*model, market, payoff, vol)?;

        // Zero variance: the value is the discounted payoff of the forward,
        // including its behaviour exactly at the strike.
        let price = if model.terminal_stddev(market, payoff.maturity) <= 0.0 {
            market.discount(payoff.maturity) * payoff.evaluate(model.forward(market, payoff.maturity))
        } else {
            payoff.notional * unit_price
        };

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::Vol, vol);

        PricingResult {
            price,
            stderr: None,
            greeks: Some(greeks.scaled(payoff.notional).to_map()),
            diagnostics,
        }
        .ensure_finite("analytic")
    }
}
