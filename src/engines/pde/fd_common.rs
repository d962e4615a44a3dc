//! Shared finite-difference machinery: the price axis, the spatial operator
//! and the tridiagonal solver.
//!
//! The axis is a sinh-stretched grid (Tavella and Randall, 2000, §5.3) that
//! concentrates nodes around the strike, where the payoff kink or jump
//! lives, and leaves the tails coarse. Spot is forced onto a node so that the
//! price and the grid Greeks are read off without interpolation. The domain
//! is never capped: a high `σ√T` widens the tails and the stretch keeps the
//! resolution near the money.
//!
//! Derivatives use the three-point non-uniform stencil, second order at
//! every interior node. Both edges carry a linear-extrapolation boundary
//! (`V_SS = 0`), which suits calls, puts and digitals alike.

use crate::core::PricingError;
use crate::market::MarketEnvironment;
use crate::models::Model;

/// Fewest intervals allowed between spot and either edge of the axis.
pub(super) const MIN_SPOT_INDEX: usize = 5;

/// Width of the dense region around the strike under Black-Scholes, as a
/// fraction of `max(S, K)`.
const LOGNORMAL_CONCENTRATION: f64 = 0.5;

/// Non-uniform price axis with spot exactly on node `spot_index`.
#[derive(Debug, Clone)]
pub(super) struct PriceGrid {
    pub spot_index: usize,
    pub nodes: Vec<f64>,
}

impl PriceGrid {
    pub fn lo(&self) -> f64 {
        self.nodes[0]
    }

    pub fn hi(&self) -> f64 {
        self.nodes[self.nodes.len() - 1]
    }

    /// Spacings `(h_-, h_+)` around interior node `j`.
    #[inline]
    pub fn spacing(&self, j: usize) -> (f64, f64) {
        (
            self.nodes[j] - self.nodes[j - 1],
            self.nodes[j + 1] - self.nodes[j],
        )
    }

    /// Three-point weights of the first derivative at interior node `j`.
    #[inline]
    pub fn first_derivative_weights(&self, j: usize) -> [f64; 3] {
        let (hm, hp) = self.spacing(j);
        [
            -hp / (hm * (hm + hp)),
            (hp - hm) / (hm * hp),
            hm / (hp * (hm + hp)),
        ]
    }

    /// Three-point weights of the second derivative at interior node `j`.
    #[inline]
    pub fn second_derivative_weights(&self, j: usize) -> [f64; 3] {
        let (hm, hp) = self.spacing(j);
        [
            2.0 / (hm * (hm + hp)),
            -2.0 / (hm * hp),
            2.0 / (hp * (hm + hp)),
        ]
    }

    /// Ratios `h_0 / h_1` and `h_{n-1} / h_{n-2}` of the edge spacings, used by
    /// the linear extrapolation at each boundary.
    #[inline]
    fn edge_ratios(&self) -> (f64, f64) {
        let x = &self.nodes;
        let n = x.len() - 1;
        (
            (x[1] - x[0]) / (x[2] - x[1]),
            (x[n] - x[n - 1]) / (x[n - 1] - x[n - 2]),
        )
    }

    /// Bounds of the cell owned by node `i`: midpoints to its neighbours,
    /// clipped to the axis.
    pub fn cell(&self, i: usize) -> (f64, f64) {
        let x = &self.nodes;
        let n = x.len() - 1;
        let lo = if i == 0 { x[0] } else { 0.5 * (x[i - 1] + x[i]) };
        let hi = if i == n { x[n] } else { 0.5 * (x[i] + x[i + 1]) };
        (lo, hi)
    }
}

/// Builds the price axis over `[m - k sd, m + k sd]` of the terminal
/// distribution (log space for Black-Scholes), padded to contain spot and
/// strike, then stretched around the strike with spot on a node.
///
/// Fails with [`PricingError::InvalidGridConfiguration`] when fewer than
/// [`MIN_SPOT_INDEX`] intervals separate spot from either edge.
pub(super) fn build_price_grid(
    model: Model,
    market: &MarketEnvironment,
    strike: f64,
    maturity: f64,
    price_steps: usize,
    std_devs: f64,
) -> Result<PriceGrid, PricingError> {
    let sd = model.terminal_stddev(market, maturity);
    let spot = market.spot;
    let (mut lo, mut hi, concentration) = match model {
        Model::BlackScholes => {
            let mean = model.forward(market, maturity).ln() - 0.5 * sd * sd;
            (
                (mean - std_devs * sd).exp(),
                (mean + std_devs * sd).exp(),
                LOGNORMAL_CONCENTRATION * spot.max(strike),
            )
        }
        Model::Bachelier => {
            let mean = model.forward(market, maturity);
            (
                mean - std_devs * sd,
                mean + std_devs * sd,
                sd.max(0.5 * (spot - strike).abs()),
            )
        }
    };
    let pad = 0.1 * (hi.max(spot).max(strike) - lo.min(spot).min(strike));
    lo = lo.min(spot.min(strike) - pad);
    hi = hi.max(spot.max(strike) + pad);
    // Black-Scholes prices live on [0, ∞).
    if matches!(model, Model::BlackScholes) {
        lo = lo.max(0.0);
    }
    let width = hi - lo;
    if !(lo.is_finite() && hi.is_finite() && width > 0.0 && concentration > 0.0) {
        return Err(PricingError::InvalidGridConfiguration(format!(
            "degenerate price domain [{lo}, {hi}]"
        )));
    }

    // z in [0, 1] maps to lo + width z; z = anchor + alpha sinh(y).
    let anchor = (strike - lo) / width;
    let alpha = concentration / width;
    let y_lo = (-anchor / alpha).asinh();
    let y_hi = ((1.0 - anchor) / alpha).asinh();
    let y_spot = (((spot - lo) / width - anchor) / alpha).asinh();

    let n = price_steps;
    let spot_index = ((y_spot - y_lo) / (y_hi - y_lo) * n as f64).round();
    if !spot_index.is_finite()
        || spot_index < MIN_SPOT_INDEX as f64
        || spot_index > (n - MIN_SPOT_INDEX.min(n)) as f64
    {
        return Err(PricingError::InvalidGridConfiguration(format!(
            "spot {spot} falls {spot_index} intervals into a {n}-interval price axis; \
             at least {MIN_SPOT_INDEX} are needed on each side (raise price_steps)"
        )));
    }
    let spot_index = spot_index as usize;

    // Rescale the sinh coordinate so that node `spot_index` lands on spot.
    let dy = (y_spot - y_lo) / spot_index as f64;
    let mut nodes: Vec<f64> = (0..=n)
        .map(|i| lo + width * (anchor + alpha * (y_lo + i as f64 * dy).sinh()))
        .collect();
    nodes[0] = lo;
    nodes[spot_index] = spot;
    if nodes.windows(2).any(|w| w[1] <= w[0]) {
        return Err(PricingError::InvalidGridConfiguration(
            "price axis is not strictly increasing".to_string(),
        ));
    }
    Ok(PriceGrid { spot_index, nodes })
}

/// Spatial operator `L V = a V_SS + b V_S - r V` on interior rows, stored as
/// `(lower, diag, upper)` bands of length `n - 1` for nodes `1..n`.
///
/// The linear-extrapolation boundary (`V_SS = 0` at both edges) is folded in:
/// `V_0 = (1 + ρ_0) V_1 - ρ_0 V_2` with `ρ_0 = h_0 / h_1`, and symmetrically
/// at the top.
pub(super) fn build_operator(
    model: Model,
    market: &MarketEnvironment,
    grid: &PriceGrid,
    t: f64,
    lower: &mut [f64],
    diag: &mut [f64],
    upper: &mut [f64],
) {
    let interior = lower.len();

    for k in 0..interior {
        let j = k + 1;
        let coeffs = model.pde_coefficients(market, grid.nodes[j], t);
        let [d1_m, d1_0, d1_p] = grid.first_derivative_weights(j);
        let [d2_m, d2_0, d2_p] = grid.second_derivative_weights(j);
        let (a, b) = (coeffs.half_variance, coeffs.drift);
        lower[k] = a.mul_add(d2_m, b * d1_m);
        diag[k] = a.mul_add(d2_0, b * d1_0) - market.rate;
        upper[k] = a.mul_add(d2_p, b * d1_p);
    }

    let (rho_lo, rho_hi) = grid.edge_ratios();
    // Row 1: l V_0 + d V_1 + u V_2 with V_0 folded in.
    diag[0] += (1.0 + rho_lo) * lower[0];
    upper[0] -= rho_lo * lower[0];
    lower[0] = 0.0;
    // Row n-1: l V_{n-2} + d V_{n-1} + u V_n with V_n folded in.
    let last = interior - 1;
    diag[last] += (1.0 + rho_hi) * upper[last];
    lower[last] -= rho_hi * upper[last];
    upper[last] = 0.0;
}

/// Fills the boundary nodes by linear extrapolation.
#[inline]
pub(super) fn extrapolate_boundaries(grid: &PriceGrid, values: &mut [f64]) {
    let n = values.len() - 1;
    let (rho_lo, rho_hi) = grid.edge_ratios();
    values[0] = (1.0 + rho_lo) * values[1] - rho_lo * values[2];
    values[n] = (1.0 + rho_hi) * values[n - 1] - rho_hi * values[n - 2];
}

/// In-place tridiagonal solve using pre-allocated scratch buffers.
/// Writes the solution into `x`; `c_star` and `d_star` are scratch space.
#[inline(always)]
pub(super) fn solve_tridiagonal_inplace(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
    c_star: &mut [f64],
    d_star: &mut [f64],
    x: &mut [f64],
) -> Result<(), PricingError> {
    let n = diag.len();

    let inv_denom0 = 1.0 / diag[0];
    if !inv_denom0.is_finite() {
        return Err(PricingError::NonFiniteResult(
            "tridiagonal solver singular matrix".to_string(),
        ));
    }
    c_star[0] = if n > 1 { upper[0] * inv_denom0 } else { 0.0 };
    d_star[0] = rhs[0] * inv_denom0;

    for i in 1..n {
        let denom = (-lower[i]).mul_add(c_star[i - 1], diag[i]);
        if denom.abs() <= 1.0e-14 {
            return Err(PricingError::NonFiniteResult(
                "tridiagonal solver singular matrix".to_string(),
            ));
        }
        let inv_denom = 1.0 / denom;
        c_star[i] = if i < n - 1 { upper[i] * inv_denom } else { 0.0 };
        d_star[i] = (-lower[i]).mul_add(d_star[i - 1], rhs[i]) * inv_denom;
    }

    x[n - 1] = d_star[n - 1];
    for i in (0..(n - 1)).rev() {
        x[i] = (-c_star[i]).mul_add(x[i + 1], d_star[i]);
    }
    Ok(())
}
