//! Backward induction on recombining binomial and trinomial lattices.
//!
//! References: Cox, Ross and Rubinstein (1979); Jarrow and Rudd (1983);
//! Boyle (1986) for the trinomial tree; Leisen and Reimer (1996) on
//! strike placement and convergence.
//!
//! Numerical considerations:
//! - Error is `O(1/n)`. The strike is placed on a terminal node (see
//!   [`lattice`](super::lattice)), which removes the odd/even oscillation
//!   of vanilla prices and keeps bump-and-revalue Greeks stable.
//! - A digital with its strike on a node pays the mean of its one-sided
//!   limits there.
//! - Early exercise is checked at every layer flagged by the exercise style.
//!   Lattice delta, gamma and theta come from the first layer with three
//!   nodes.
//!
//! Use a tree for American and Bermudan exercise on a single asset when a
//! few hundred steps are affordable. The trinomial tree converges faster
//! per step; the binomial tree is cheaper per step.

use serde::{Deserialize, Serialize};

use crate::core::{
    DiagKey, Diagnostics, ExerciseStyle, Greek, GreekMap, PricingEngine, PricingError,
    PricingResult,
};
use crate::engines::tree::lattice::{Lattice, TreeType};
use crate::instruments::Payoff;
use crate::market::MarketEnvironment;
use crate::models::Model;

/// Recombining binomial/trinomial lattice engine.
///
/// Handles European, American and Bermudan exercise for terminal payoffs
/// under both models. Delta, gamma and theta are read off the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeEngine {
    /// Number of time steps.
    pub steps: usize,
    pub tree_type: TreeType,
}

impl Default for TreeEngine {
    fn default() -> Self {
        Self {
            steps: 500,
            tree_type: TreeType::Binomial,
        }
    }
}

impl TreeEngine {
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn binomial(steps: usize) -> Self {
        Self::new(steps)
    }

    pub fn trinomial(steps: usize) -> Self {
        Self {
            steps,
            tree_type: TreeType::Trinomial,
        }
    }

    pub fn with_tree_type(mut self, tree_type: TreeType) -> Self {
        self.tree_type = tree_type;
        self
    }
}

/// Delta, gamma and theta from three adjacent nodes at time `t` and the root.
fn lattice_greeks(spots: [f64; 3], values: [f64; 3], spot: f64, root: f64, t: f64) -> Option<GreekMap> {
    let [sd, sm, su] = spots;
    let [vd, vm, vu] = values;
    if !(su - sm > 0.0 && sm - sd > 0.0 && t > 0.0) {
        return None;
    }
    let delta = (vu - vd) / (su - sd);
    let gamma = ((vu - vm) / (su - sm) - (vm - vd) / (sm - sd)) / (0.5 * (su - sd));
    // The centre node drifts away from spot; remove the spot move before
    // attributing the change to time.
    let shift = sm - spot;
    let theta = (vm - root - delta * shift - 0.5 * gamma * shift * shift) / t;

    let mut greeks = GreekMap::new();
    greeks.insert(Greek::Delta, delta);
    greeks.insert(Greek::Gamma, gamma);
    greeks.insert(Greek::Theta, theta);
    Some(greeks)
}

impl PricingEngine for TreeEngine {
    fn price(
        &self,
        model: &Model,
        market: &MarketEnvironment,
        payoff: &Payoff,
    ) -> Result<PricingResult, PricingError> {
        payoff.validate()?;
        market.validate()?;

        if self.steps == 0 {
            return Err(PricingError::InvalidStepCount(
                "tree steps must be > 0".to_string(),
            ));
        }
        if payoff.is_path_dependent() {
            return Err(PricingError::UnsupportedCombination(
                "tree engine cannot price path-dependent payoffs".to_string(),
            ));
        }

        let n = self.steps;
        let lattice = Lattice::new(
            *model,
            market,
            payoff.strike(),
            payoff.maturity,
            n,
            self.tree_type,
        );
        let (pu, pm, pd) = lattice.probabilities;
        let disc = (-market.rate * lattice.dt).exp();
        let (disc_u, disc_m, disc_d) = (disc * pu, disc * pm, disc * pd);

        tracing::debug!(
            model = model.name(),
            steps = n,
            tree = ?self.tree_type,
            dx = lattice.dx,
            "tree pricing"
        );

        let exercise_flags = match &payoff.style {
            ExerciseStyle::European => None,
            style => Some(style.exercise_flags(payoff.maturity, n)),
        };

        let terminal = |level: f64| {
            if lattice.dx > 0.0 {
                payoff.evaluate_node(level)
            } else {
                payoff.evaluate(level)
            }
        };
        let mut values: Vec<f64> = (0..self.tree_type.width(n))
            .map(|j| terminal(lattice.spot_at(n, j)))
            .collect();

        let greek_layer = self.tree_type.greek_layer();
        let mut snapshot: Option<([f64; 3], [f64; 3])> = None;
        if n == greek_layer {
            snapshot = Some((
                [lattice.spot_at(n, 0), lattice.spot_at(n, 1), lattice.spot_at(n, 2)],
                [values[0], values[1], values[2]],
            ));
        }

        for i in (0..n).rev() {
            let width = self.tree_type.width(i);
            match self.tree_type {
                TreeType::Binomial => {
                    for j in 0..width {
                        values[j] = disc_u.mul_add(values[j + 1], disc_d * values[j]);
                    }
                }
                TreeType::Trinomial => {
                    for j in 0..width {
                        values[j] = disc_u.mul_add(
                            values[j + 2],
                            disc_m.mul_add(values[j + 1], disc_d * values[j]),
                        );
                    }
                }
            }

            if exercise_flags.as_ref().is_some_and(|flags| flags[i]) {
                for (j, value) in values.iter_mut().take(width).enumerate() {
                    *value = value.max(payoff.exercise_value(lattice.spot_at(i, j)));
                }
            }

            if i == greek_layer {
                snapshot = Some((
                    [
                        lattice.spot_at(i, 0),
                        lattice.spot_at(i, 1),
                        lattice.spot_at(i, 2),
                    ],
                    [values[0], values[1], values[2]],
                ));
            }
        }

        let mut price = values[0];
        if matches!(payoff.style, ExerciseStyle::American) {
            price = price.max(payoff.exercise_value(market.spot));
        }

        let greeks = snapshot.and_then(|(spots, layer_values)| {
            lattice_greeks(
                spots,
                layer_values,
                market.spot,
                price,
                greek_layer as f64 * lattice.dt,
            )
        });

        let (u, d) = lattice.moves();
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::NumSteps, n as f64);
        diagnostics.insert_key(DiagKey::Vol, lattice.vol);
        diagnostics.insert_key(DiagKey::U, u);
        diagnostics.insert_key(DiagKey::D, d);
        diagnostics.insert_key(DiagKey::Pu, pu);
        diagnostics.insert_key(DiagKey::Pm, pm);
        diagnostics.insert_key(DiagKey::Pd, pd);

        PricingResult {
            price,
            stderr: None,
            greeks,
            diagnostics,
        }
        .ensure_finite("tree")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::analytic::{bs_digital_price, bs_greeks, bs_price, AnalyticEngine};
    use crate::core::OptionType;
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
    fn zero_steps_is_rejected() {
        let err = TreeEngine::new(0)
            .price(&Model::BlackScholes, &market(0.2), &Payoff::european_call(100.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidStepCount(_)));
    }

    #[test]
    fn asian_is_unsupported() {
        let err = TreeEngine::new(50)
            .price(&Model::BlackScholes, &market(0.2), &Payoff::asian_call(100.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, PricingError::UnsupportedCombination(_)));
    }

    #[test]
    fn binomial_and_trinomial_converge_to_black_scholes() {
        let reference = bs_price(OptionType::Put, 100.0, 105.0, 0.05, 0.0, 0.2, 1.0);
        for engine in [TreeEngine::binomial(800), TreeEngine::trinomial(400)] {
            let result = engine
                .price(&Model::BlackScholes, &market(0.2), &Payoff::european_put(105.0, 1.0))
                .unwrap();
            assert_relative_eq!(result.price, reference, max_relative = 2e-3);
        }
    }

    #[test]
    fn lattice_greeks_close_to_analytic() {
        let g = bs_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        let result = TreeEngine::trinomial(500)
            .price(&Model::BlackScholes, &market(0.2), &Payoff::european_call(100.0, 1.0))
            .unwrap();
        let greeks = result.greeks.unwrap();
        assert_relative_eq!(greeks[&Greek::Delta], g.delta, epsilon = 5e-3);
        assert_relative_eq!(greeks[&Greek::Gamma], g.gamma, epsilon = 1e-3);
        assert_relative_eq!(greeks[&Greek::Theta], g.theta, epsilon = 0.2);
    }

    #[test]
    fn bumped_rate_sensitivity_is_smooth() {
        // S=K=100, r=5%, q=2%, σ=25%, T=1: exact rho ≈ 47.37.
        let m = |rate: f64| {
            MarketEnvironment::builder()
                .spot(100.0)
                .rate(rate)
                .dividend_yield(0.02)
                .flat_vol(0.25)
                .build()
                .unwrap()
        };
        let exact = bs_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.02, 0.25, 1.0);
        let payoff = Payoff::european_call(100.0, 1.0);
        for engine in [TreeEngine::binomial(500), TreeEngine::trinomial(500)] {
            let px = |rate: f64| engine.price(&Model::BlackScholes, &m(rate), &payoff).unwrap().price;
            let rho = (px(0.0501) - px(0.0499)) / 2e-4;
            assert_relative_eq!(rho, exact.rho, max_relative = 2e-3);
        }
    }

    #[test]
    fn digital_strike_on_a_node_is_unbiased() {
        let exact = bs_digital_price(OptionType::Call, 100.0, 100.0, 1.0, 0.05, 0.0, 0.2, 1.0);
        for engine in [TreeEngine::binomial(400), TreeEngine::trinomial(400)] {
            let result = engine
                .price(&Model::BlackScholes, &market(0.2), &Payoff::digital_call(100.0, 1.0, 1.0))
                .unwrap();
            assert_relative_eq!(result.price, exact, epsilon = 2e-3);
        }
    }

    #[test]
    fn american_put_dominates_european() {
        let m = market(0.2);
        let euro = TreeEngine::new(400)
            .price(&Model::BlackScholes, &m, &Payoff::european_put(100.0, 1.0))
            .unwrap();
        let amer = TreeEngine::new(400)
            .price(&Model::BlackScholes, &m, &Payoff::american_put(100.0, 1.0))
            .unwrap();
        let berm = TreeEngine::new(400)
            .price(
                &Model::BlackScholes,
                &m,
                &Payoff::european_put(100.0, 1.0).with_style(ExerciseStyle::Bermudan {
                    dates: vec![0.25, 0.5, 0.75, 1.0],
                }),
            )
            .unwrap();
        assert!(amer.price > euro.price);
        assert!(berm.price >= euro.price - 1e-12);
        assert!(berm.price <= amer.price + 1e-12);
        // Reference American put (S=K=100, r=5%, σ=20%, T=1).
        assert_relative_eq!(amer.price, 6.0904, epsilon = 0.01);
    }

    #[test]
    fn bachelier_tree_matches_closed_form() {
        let m = MarketEnvironment::builder()
            .spot(100.0)
            .rate(0.03)
            .flat_vol(15.0)
            .build()
            .unwrap();
        let payoff = Payoff::european_call(102.0, 1.0);
        let exact = AnalyticEngine::new().price(&Model::Bachelier, &m, &payoff).unwrap();
        let tree = TreeEngine::binomial(1000)
            .price(&Model::Bachelier, &m, &payoff)
            .unwrap();
        assert_relative_eq!(tree.price, exact.price, epsilon = 0.02);
    }

    #[test]
    fn zero_vol_gives_discounted_forward_payoff() {
        let m = market(0.0);
        let payoff = Payoff::european_call(95.0, 1.0);
        let result = TreeEngine::new(10)
            .price(&Model::BlackScholes, &m, &payoff)
            .unwrap();
        let fwd = 100.0 * 0.05_f64.exp();
        assert_relative_eq!(result.price, (-0.05_f64).exp() * (fwd - 95.0), max_relative = 1e-12);
        assert!(result.greeks.is_none());
    }
}
