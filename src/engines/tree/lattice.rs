//! Recombining lattice geometry.
//!
//! Node `j` of layer `i` sits at the signed offset `k` from the centre line
//! (`k = 2j - i` for binomial, `k = j - i` for trinomial), ordered by
//! increasing price.
//!
//! Black-Scholes: `S(i, k) = S0 exp((ν + δ) t_i + k Δx)` with
//! `ν = r - q - σ̄²/2`. Bachelier: the discounted price `X = S e^{-μt}` is
//! driftless, so `S(i, k) = (S0 + δ t_i + k Δx) e^{μ t_i}`.
//!
//! The centre line is tilted by a small `δ` so that the strike is a node of
//! the last layer, and the branch probabilities absorb the tilt to keep the
//! first two moments of each step. With the kink on a node the price error
//! stops oscillating with the step count, and bumped Greeks (rho, vega) are
//! smooth in the inputs.

use serde::{Deserialize, Serialize};

use crate::market::MarketEnvironment;
use crate::models::Model;

/// Lattice branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeType {
    #[default]
    Binomial,
    Trinomial,
}

impl TreeType {
    /// Nodes in layer `i`.
    #[inline]
    pub fn width(self, i: usize) -> usize {
        match self {
            Self::Binomial => i + 1,
            Self::Trinomial => 2 * i + 1,
        }
    }

    /// Branch probabilities `(p_up, p_mid, p_down)` when the centre line
    /// moves by `a Δx` per step less than the mean.
    #[inline]
    pub fn probabilities(self, a: f64) -> (f64, f64, f64) {
        match self {
            Self::Binomial => (0.5 * (1.0 + a), 0.0, 0.5 * (1.0 - a)),
            Self::Trinomial => (1.0 / 6.0 + 0.5 * a, 2.0 / 3.0, 1.0 / 6.0 - 0.5 * a),
        }
    }

    /// Layer used for spot Greeks: the first with three nodes.
    #[inline]
    pub fn greek_layer(self) -> usize {
        match self {
            Self::Binomial => 2,
            Self::Trinomial => 1,
        }
    }

    /// Distance between neighbouring nodes of one layer, in units of `Δx`.
    #[inline]
    fn node_spacing(self) -> f64 {
        match self {
            Self::Binomial => 2.0,
            Self::Trinomial => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Lattice {
    pub tree_type: TreeType,
    pub model: Model,
    pub spot: f64,
    pub dt: f64,
    pub dx: f64,
    /// Per-unit-time drift of the centre line in the lattice coordinate.
    pub drift: f64,
    /// Growth rate applied on top of the coordinate (Bachelier only).
    pub carry: f64,
    pub vol: f64,
    /// Branch probabilities `(p_up, p_mid, p_down)`.
    pub probabilities: (f64, f64, f64),
}

impl Lattice {
    pub fn new(
        model: Model,
        market: &MarketEnvironment,
        strike: f64,
        maturity: f64,
        steps: usize,
        tree_type: TreeType,
    ) -> Self {
        let dt = maturity / steps as f64;
        let spread = match tree_type {
            TreeType::Binomial => 1.0,
            TreeType::Trinomial => 3.0,
        };
        let vol = market.vol(maturity);
        let carry = market.carry();
        // (Δx, natural drift, start and strike in the lattice coordinate)
        let (dx, natural, start, target) = match model {
            Model::BlackScholes => (
                (spread * vol * vol * dt).sqrt(),
                carry - 0.5 * vol * vol,
                market.spot.ln(),
                strike.ln(),
            ),
            Model::Bachelier => {
                let x_var = model.transition_variance(market, 0.0, maturity)
                    * (-2.0 * carry * maturity).exp();
                (
                    (spread * x_var / steps as f64).max(0.0).sqrt(),
                    0.0,
                    market.spot,
                    strike * (-carry * maturity).exp(),
                )
            }
        };

        let tilt = strike_tilt(tree_type, steps, dx, target - (start + natural * maturity));
        let a = if dx > 0.0 { -tilt * dt / (maturity * dx) } else { 0.0 };
        let probabilities = tree_type.probabilities(a);
        let (delta, probabilities) = if probabilities.0 >= 0.0 && probabilities.2 >= 0.0 {
            (tilt / maturity, probabilities)
        } else {
            // Too few steps to absorb the tilt: keep the untilted lattice.
            (0.0, tree_type.probabilities(0.0))
        };

        Self {
            tree_type,
            model,
            spot: market.spot,
            dt,
            dx,
            drift: natural + delta,
            carry,
            vol,
            probabilities,
        }
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> f64 {
        match self.tree_type {
            TreeType::Binomial => 2.0 * j as f64 - i as f64,
            TreeType::Trinomial => j as f64 - i as f64,
        }
    }

    /// Underlying price at node `(i, j)`.
    #[inline]
    pub fn spot_at(&self, i: usize, j: usize) -> f64 {
        let t = i as f64 * self.dt;
        let k = self.offset(i, j);
        match self.model {
            Model::BlackScholes => self.spot * (self.drift * t + k * self.dx).exp(),
            Model::Bachelier => {
                (self.spot + self.drift * t + k * self.dx) * (self.carry * t).exp()
            }
        }
    }

    /// Up and down moves as reported in diagnostics: multiplicative factors
    /// for Black-Scholes, additive steps of `X` for Bachelier.
    pub fn moves(&self) -> (f64, f64) {
        match self.model {
            Model::BlackScholes => (self.dx.exp(), (-self.dx).exp()),
            Model::Bachelier => (self.dx, -self.dx),
        }
    }
}

/// Total centre-line shift over the life of the tree that puts `gap` (strike
/// minus untilted centre, lattice coordinate) on a terminal node. The shift
/// is at most half a node spacing.
fn strike_tilt(tree_type: TreeType, steps: usize, dx: f64, gap: f64) -> f64 {
    if !(dx > 0.0 && gap.is_finite()) {
        return 0.0;
    }
    // Binomial terminal offsets share the parity of the step count.
    let parity = match tree_type {
        TreeType::Binomial => (steps % 2) as f64 * dx,
        TreeType::Trinomial => 0.0,
    };
    let spacing = tree_type.node_spacing() * dx;
    let off = gap - parity;
    off - (off / spacing).round() * spacing
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn binomial_layer_matches_forward() {
        let m = market(0.3);
        let lattice = Lattice::new(Model::BlackScholes, &m, 110.0, 1.0, 10, TreeType::Binomial);
        let (pu, _, pd) = lattice.probabilities;
        let mean = pu * lattice.spot_at(1, 1) + pd * lattice.spot_at(1, 0);
        let expected = 100.0 * (0.04 * 0.1_f64).exp();
        assert_relative_eq!(mean, expected, max_relative = 1e-3);
    }

    #[test]
    fn bachelier_nodes_are_martingale_in_discounted_price() {
        let m = market(20.0);
        let lattice = Lattice::new(Model::Bachelier, &m, 93.0, 1.0, 4, TreeType::Trinomial);
        let (pu, pm, pd) = lattice.probabilities;
        let growth = (0.04 * lattice.dt).exp();
        let mean = pu * lattice.spot_at(1, 2) + pm * lattice.spot_at(1, 1) + pd * lattice.spot_at(1, 0);
        assert_relative_eq!(mean, 100.0 * growth, max_relative = 1e-12);
    }

    #[test]
    fn strike_is_a_terminal_node() {
        for (model, m, strike) in [
            (Model::BlackScholes, market(0.25), 107.3),
            (Model::Bachelier, market(25.0), 91.0),
        ] {
            for (tree_type, steps) in [
                (TreeType::Binomial, 101),
                (TreeType::Binomial, 100),
                (TreeType::Trinomial, 75),
            ] {
                let lattice = Lattice::new(model, &m, strike, 1.0, steps, tree_type);
                let closest = (0..tree_type.width(steps))
                    .map(|j| (lattice.spot_at(steps, j) - strike).abs())
                    .fold(f64::INFINITY, f64::min);
                assert!(closest < 1e-9 * strike, "{model:?} {tree_type:?} {steps}: {closest}");
            }
        }
    }

    #[test]
    fn tilted_probabilities_stay_valid() {
        let m = market(0.4);
        for tree_type in [TreeType::Binomial, TreeType::Trinomial] {
            for steps in [1, 2, 3, 50] {
                let lattice = Lattice::new(Model::BlackScholes, &m, 131.0, 0.5, steps, tree_type);
                let (pu, pm, pd) = lattice.probabilities;
                assert!(pu >= 0.0 && pm >= 0.0 && pd >= 0.0);
                assert_relative_eq!(pu + pm + pd, 1.0, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn zero_vol_collapses_nodes() {
        let m = market(0.0);
        for model in [Model::BlackScholes, Model::Bachelier] {
            let lattice = Lattice::new(model, &m, 100.0, 1.0, 5, TreeType::Binomial);
            assert_eq!(lattice.probabilities, (0.5, 0.0, 0.5));
            assert_relative_eq!(
                lattice.spot_at(5, 0),
                lattice.spot_at(5, 5),
                max_relative = 1e-14
            );
            assert_relative_eq!(lattice.spot_at(5, 2), model.forward(&m, 1.0), max_relative = 1e-12);
        }
    }
}
