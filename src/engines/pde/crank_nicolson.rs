//! Crank-Nicolson finite differences for the backward pricing PDE
//! `V_t + a(S, t) V_SS + b(S) V_S - r V = 0` of either [`Model`].
//!
//! References: Crank and Nicolson (1947); Rannacher (1984) for the implicit
//! start; Tavella and Randall (2000) for stretched grids and boundary
//! handling; Duffy (2006) ch. 10-12.
//!
//! Numerical considerations:
//! - Crank-Nicolson is second order in time but undamped. Non-smooth
//!   terminal data (digitals, and to a lesser degree vanilla kinks) can
//!   ring; `rannacher_steps` of fully implicit half steps damp it.
//! - The terminal payoff is averaged over the cell that straddles the
//!   strike, which removes the `O(h)` bias of sampling a jump at a node.
//! - American and Bermudan exercise is applied by clipping after each step
//!   (explicit projection), which is first order in time at the boundary.
//!
//! Use this engine for single-asset European and early-exercise payoffs
//! when smooth grid Greeks matter. Path-dependent payoffs belong to Monte
//! Carlo.

use serde::{Deserialize, Serialize};

use crate::core::{
    DiagKey, Diagnostics, ExerciseStyle, Greek, GreekMap, PricingEngine, PricingError,
    PricingResult,
};
use crate::engines::pde::fd_common::{
    build_operator, build_price_grid, extrapolate_boundaries, solve_tridiagonal_inplace, PriceGrid,
};
use crate::instruments::Payoff;
use crate::market::MarketEnvironment;
use crate::models::Model;

/// Crank-Nicolson finite-difference engine for the pricing PDE of any
/// [`Model`].
///
/// The price axis spans `std_devs` terminal standard deviations around the
/// forward and is stretched to concentrate nodes near the strike. Coefficients are re-evaluated every step, so time-dependent
/// volatility is honoured. An optional Rannacher start replaces the first
/// `rannacher_steps` steps by pairs of fully implicit half steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrankNicolsonEngine {
    /// Number of price intervals.
    pub price_steps: usize,
    /// Number of time steps.
    pub time_steps: usize,
    /// Half-width of the price domain in terminal standard deviations.
    pub std_devs: f64,
    /// Leading fully implicit steps.
    pub rannacher_steps: usize,
}

impl Default for CrankNicolsonEngine {
    fn default() -> Self {
        Self {
            price_steps: 200,
            time_steps: 200,
            std_devs: 5.0,
            rannacher_steps: 0,
        }
    }
}

impl CrankNicolsonEngine {
    /// Creates a Crank-Nicolson engine with explicit grid sizes.
    pub fn new(price_steps: usize, time_steps: usize) -> Self {
        Self {
            price_steps,
            time_steps,
            ..Self::default()
        }
    }

    pub fn with_std_devs(mut self, std_devs: f64) -> Self {
        self.std_devs = std_devs;
        self
    }

    pub fn with_rannacher_steps(mut self, rannacher_steps: usize) -> Self {
        self.rannacher_steps = rannacher_steps;
        self
    }

    fn validate(&self) -> Result<(), PricingError> {
        if self.price_steps < 3 {
            return Err(PricingError::InvalidGridConfiguration(
                "price_steps must be >= 3".to_string(),
            ));
        }
        if self.time_steps == 0 {
            return Err(PricingError::InvalidGridConfiguration(
                "time_steps must be > 0".to_string(),
            ));
        }
        if !self.std_devs.is_finite() || self.std_devs < 3.0 {
            return Err(PricingError::InvalidGridConfiguration(format!(
                "std_devs must be finite and >= 3 to contain the terminal distribution (got {})",
                self.std_devs
            )));
        }
        Ok(())
    }

    /// Deterministic dynamics: march the single characteristic through spot.
    fn price_along_characteristic(
        &self,
        market: &MarketEnvironment,
        payoff: &Payoff,
    ) -> f64 {
        let n_t = self.time_steps;
        let dt = payoff.maturity / n_t as f64;
        let mu = market.carry();
        let disc = (-market.rate * dt).exp();
        let flags = match &payoff.style {
            ExerciseStyle::European => None,
            style => Some(style.exercise_flags(payoff.maturity, n_t)),
        };

        let spot_at = |m: usize| market.spot * (mu * m as f64 * dt).exp();
        let mut value = payoff.evaluate(spot_at(n_t));
        for m in (0..n_t).rev() {
            value *= disc;
            if flags.as_ref().is_some_and(|f| f[m]) {
                value = value.max(payoff.exercise_value(spot_at(m)));
            }
        }
        if matches!(payoff.style, ExerciseStyle::American) {
            value = value.max(payoff.exercise_value(market.spot));
        }
        value
    }
}

/// Scratch buffers for one backward step.
struct StepWorkspace {
    lower: Vec<f64>,
    diag: Vec<f64>,
    upper: Vec<f64>,
    lhs_lower: Vec<f64>,
    lhs_diag: Vec<f64>,
    lhs_upper: Vec<f64>,
    rhs: Vec<f64>,
    c_star: Vec<f64>,
    d_star: Vec<f64>,
}

impl StepWorkspace {
    fn new(interior: usize) -> Self {
        Self {
            lower: vec![0.0; interior],
            diag: vec![0.0; interior],
            upper: vec![0.0; interior],
            lhs_lower: vec![0.0; interior],
            lhs_diag: vec![0.0; interior],
            lhs_upper: vec![0.0; interior],
            rhs: vec![0.0; interior],
            c_star: vec![0.0; interior],
            d_star: vec![0.0; interior],
        }
    }

    /// Advances `values` from `t + dt` back to `t` with weight `theta` on the
    /// implicit side (`0.5` Crank-Nicolson, `1.0` fully implicit).
    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        model: Model,
        market: &MarketEnvironment,
        grid: &PriceGrid,
        t: f64,
        dt: f64,
        theta: f64,
        values: &mut [f64],
    ) -> Result<(), PricingError> {
        build_operator(
            model,
            market,
            grid,
            t + 0.5 * dt,
            &mut self.lower,
            &mut self.diag,
            &mut self.upper,
        );

        let explicit = (1.0 - theta) * dt;
        let implicit = theta * dt;
        let interior = self.diag.len();
        for k in 0..interior {
            let j = k + 1;
            // Edge rows carry zero outer bands once the boundary is folded in.
            let applied = self.lower[k].mul_add(
                values[j - 1],
                self.diag[k].mul_add(values[j], self.upper[k] * values[j + 1]),
            );
            self.rhs[k] = explicit.mul_add(applied, values[j]);

            self.lhs_lower[k] = -implicit * self.lower[k];
            self.lhs_diag[k] = 1.0 - implicit * self.diag[k];
            self.lhs_upper[k] = -implicit * self.upper[k];
        }

        solve_tridiagonal_inplace(
            &self.lhs_lower,
            &self.lhs_diag,
            &self.lhs_upper,
            &self.rhs,
            &mut self.c_star,
            &mut self.d_star,
            &mut values[1..=interior],
        )?;
        extrapolate_boundaries(grid, values);
        Ok(())
    }
}

impl PricingEngine for CrankNicolsonEngine {
    fn price(
        &self,
        model: &Model,
        market: &MarketEnvironment,
        payoff: &Payoff,
    ) -> Result<PricingResult, PricingError> {
        payoff.validate()?;
        market.validate()?;
        self.validate()?;
        if payoff.is_path_dependent() {
            return Err(PricingError::UnsupportedCombination(
                "finite-difference engine cannot price path-dependent payoffs".to_string(),
            ));
        }

        let n_t = self.time_steps;
        let n_s = self.price_steps;
        let maturity = payoff.maturity;
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::NumPriceSteps, n_s as f64);
        diagnostics.insert_key(DiagKey::NumTimeSteps, n_t as f64);

        if model.terminal_stddev(market, maturity) <= 0.0 {
            tracing::debug!(model = model.name(), "zero diffusion; pricing along characteristic");
            return PricingResult {
                price: self.price_along_characteristic(market, payoff),
                stderr: None,
                greeks: None,
                diagnostics,
            }
            .ensure_finite("pde");
        }

        let grid = build_price_grid(
            *model,
            market,
            payoff.strike(),
            maturity,
            n_s,
            self.std_devs,
        )?;
        diagnostics.insert_key(DiagKey::SMin, grid.lo());
        diagnostics.insert_key(DiagKey::SMax, grid.hi());

        tracing::debug!(
            model = model.name(),
            price_steps = n_s,
            time_steps = n_t,
            s_min = grid.lo(),
            s_max = grid.hi(),
            "crank-nicolson pricing"
        );

        let dt = maturity / n_t as f64;
        let flags = match &payoff.style {
            ExerciseStyle::European => None,
            style => Some(style.exercise_flags(maturity, n_t)),
        };
        let exercise: Vec<f64> = grid.nodes.iter().map(|&s| payoff.exercise_value(s)).collect();

        let mut values: Vec<f64> = grid
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let (lo, hi) = grid.cell(i);
                payoff.cell_average(s, lo, hi)
            })
            .collect();
        let mut previous_layer = values.clone();
        let mut workspace = StepWorkspace::new(n_s - 1);

        for m in (0..n_t).rev() {
            if m == 0 {
                previous_layer.copy_from_slice(&values);
            }
            let t = m as f64 * dt;
            let steps_from_maturity = n_t - 1 - m;
            if steps_from_maturity < self.rannacher_steps {
                let half = 0.5 * dt;
                workspace.step(*model, market, &grid, t + half, half, 1.0, &mut values)?;
                workspace.step(*model, market, &grid, t, half, 1.0, &mut values)?;
            } else {
                workspace.step(*model, market, &grid, t, dt, 0.5, &mut values)?;
            }

            if flags.as_ref().is_some_and(|f| f[m]) {
                for (v, &ex) in values.iter_mut().zip(&exercise) {
                    *v = v.max(ex);
                }
            }
        }

        let j = grid.spot_index;
        let mut price = values[j];
        if matches!(payoff.style, ExerciseStyle::American) {
            price = price.max(exercise[j]);
        }

        let around = [values[j - 1], values[j], values[j + 1]];
        let apply = |w: [f64; 3]| w.iter().zip(&around).map(|(w, v)| w * v).sum::<f64>();
        let mut greeks = GreekMap::new();
        greeks.insert(Greek::Delta, apply(grid.first_derivative_weights(j)));
        greeks.insert(Greek::Gamma, apply(grid.second_derivative_weights(j)));
        greeks.insert(Greek::Theta, (previous_layer[j] - price) / dt);

        PricingResult {
            price,
            stderr: None,
            greeks: Some(greeks),
            diagnostics,
        }
        .ensure_finite("pde")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionType;
    use crate::engines::analytic::{bachelier_price, bs_digital_price, bs_greeks, bs_price};
    use approx::assert_relative_eq;

    fn market(vol: f64) -> MarketEnvironment {
        MarketEnvironment::builder()
            .spot(100.0)
            .rate(0.05)
            .flat_vol(vol)
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_bad_grids() {
        let m = market(0.2);
        let payoff = Payoff::european_call(100.0, 1.0);
        for engine in [
            CrankNicolsonEngine::new(2, 100),
            CrankNicolsonEngine::new(100, 0),
            CrankNicolsonEngine::new(100, 100).with_std_devs(1.0),
            CrankNicolsonEngine::new(100, 100).with_std_devs(f64::NAN),
        ] {
            let err = engine.price(&Model::BlackScholes, &m, &payoff).unwrap_err();
            assert!(matches!(err, PricingError::InvalidGridConfiguration(_)));
        }
    }

    #[test]
    fn european_call_matches_black_scholes() {
        let result = CrankNicolsonEngine::new(200, 200)
            .price(&Model::BlackScholes, &market(0.2), &Payoff::european_call(100.0, 1.0))
            .unwrap();
        assert_relative_eq!(result.price, 10.450_583_572_185_565, epsilon = 0.01);

        let g = bs_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        let greeks = result.greeks.unwrap();
        assert_relative_eq!(greeks[&Greek::Delta], g.delta, epsilon = 2e-3);
        assert_relative_eq!(greeks[&Greek::Gamma], g.gamma, epsilon = 5e-4);
        assert_relative_eq!(greeks[&Greek::Theta], g.theta, epsilon = 0.05);
    }

    #[test]
    fn european_put_with_dividends() {
        let m = MarketEnvironment::builder()
            .spot(100.0)
            .rate(0.03)
            .dividend_yield(0.02)
            .flat_vol(0.3)
            .build()
            .unwrap();
        let result = CrankNicolsonEngine::new(300, 200)
            .price(&Model::BlackScholes, &m, &Payoff::european_put(110.0, 0.5))
            .unwrap();
        let exact = bs_price(OptionType::Put, 100.0, 110.0, 0.03, 0.02, 0.3, 0.5);
        assert_relative_eq!(result.price, exact, epsilon = 0.01);
    }

    #[test]
    fn bachelier_grid_matches_closed_form() {
        let m = market(15.0);
        let result = CrankNicolsonEngine::new(300, 200)
            .price(&Model::Bachelier, &m, &Payoff::european_put(98.0, 1.0))
            .unwrap();
        let exact = bachelier_price(OptionType::Put, 100.0, 98.0, 0.05, 0.0, 15.0, 1.0);
        assert_relative_eq!(result.price, exact, epsilon = 0.01);
    }

    #[test]
    fn rannacher_start_prices_digitals() {
        let result = CrankNicolsonEngine::new(400, 200)
            .with_rannacher_steps(2)
            .price(&Model::BlackScholes, &market(0.2), &Payoff::digital_call(100.0, 1.0, 1.0))
            .unwrap();
        let exact = bs_digital_price(OptionType::Call, 100.0, 100.0, 1.0, 0.05, 0.0, 0.2, 1.0);
        assert_relative_eq!(result.price, exact, epsilon = 1e-4);
    }

    #[test]
    fn high_total_volatility_keeps_resolution_near_spot() {
        // σ√T ≈ 1.79: a uniform axis over five deviations put spot on node 1.
        let exact = bs_price(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.8, 5.0);
        assert_relative_eq!(exact, 67.4071, epsilon = 1e-4);
        let m = market(0.8);
        let payoff = Payoff::european_call(100.0, 5.0);
        let coarse = CrankNicolsonEngine::new(200, 200)
            .price(&Model::BlackScholes, &m, &payoff)
            .unwrap();
        assert_relative_eq!(coarse.price, exact, epsilon = 0.05);
        let fine = CrankNicolsonEngine::new(400, 400)
            .price(&Model::BlackScholes, &m, &payoff)
            .unwrap();
        assert_relative_eq!(fine.price, exact, epsilon = 0.01);
        assert!(fine.diagnostics.get_key(DiagKey::SMax).unwrap() > 1_000.0);
    }

    #[test]
    fn too_few_price_steps_for_a_far_strike() {
        let err = CrankNicolsonEngine::new(10, 50)
            .price(&Model::BlackScholes, &market(0.2), &Payoff::european_call(2_000.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidGridConfiguration(_)));
    }

    #[test]
    fn digital_without_implicit_start_is_unbiased() {
        let exact = bs_digital_price(OptionType::Call, 100.0, 100.0, 1.0, 0.05, 0.0, 0.2, 1.0);
        let result = CrankNicolsonEngine::new(400, 200)
            .price(&Model::BlackScholes, &market(0.2), &Payoff::digital_call(100.0, 1.0, 1.0))
            .unwrap();
        assert_relative_eq!(result.price, exact, epsilon = 1e-3);
    }

    #[test]
    fn american_put_above_european() {
        let m = market(0.2);
        let engine = CrankNicolsonEngine::new(200, 200);
        let euro = engine
            .price(&Model::BlackScholes, &m, &Payoff::european_put(100.0, 1.0))
            .unwrap();
        let amer = engine
            .price(&Model::BlackScholes, &m, &Payoff::american_put(100.0, 1.0))
            .unwrap();
        assert!(amer.price > euro.price);
        assert_relative_eq!(amer.price, 6.0904, epsilon = 0.02);
    }

    #[test]
    fn zero_vol_follows_characteristic() {
        let m = market(0.0);
        let result = CrankNicolsonEngine::new(50, 40)
            .price(&Model::BlackScholes, &m, &Payoff::european_call(95.0, 1.0))
            .unwrap();
        let fwd = 100.0 * 0.05_f64.exp();
        assert_relative_eq!(result.price, (-0.05_f64).exp() * (fwd - 95.0), max_relative = 1e-12);
    }
}
