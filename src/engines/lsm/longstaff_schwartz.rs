//! Longstaff-Schwartz least-squares Monte Carlo for early exercise.
//!
//! Paths are simulated forward with the same [`PathSet`] machinery as the
//! European engine. Walking backward over the exercise dates, the realized
//! discounted cash flow of in-the-money paths is regressed on
//! `{1, x, ..., x^d}` with `x = S / K`, and a path exercises where the
//! immediate value beats the fitted continuation.
//!
//! References: Longstaff and Schwartz (2001); Glasserman (2004) §8.6.

use nalgebra::{DMatrix, DVector};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{
    DiagKey, Diagnostics, ExerciseStyle, PricingEngine, PricingError, PricingResult,
};
use crate::engines::monte_carlo::mc_engine::{
    american_control, estimate, validate_simulation, MonteCarloEngine, VarianceReduction,
};
use crate::engines::monte_carlo::PathSet;
use crate::instruments::Payoff;
use crate::market::MarketEnvironment;
use crate::math::resolve_seed;
use crate::models::Model;

/// Longstaff-Schwartz least-squares Monte Carlo engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongstaffSchwartz {
    /// Number of Monte Carlo paths.
    pub paths: usize,
    /// Number of time steps; every step is a candidate exercise date.
    pub time_steps: usize,
    /// Highest power in the regression basis.
    pub basis_degree: usize,
    pub variance_reduction: VarianceReduction,
    /// RNG seed. `None` draws a fresh seed per call.
    pub seed: Option<u64>,
}

impl Default for LongstaffSchwartz {
    fn default() -> Self {
        Self {
            paths: 50_000,
            time_steps: 50,
            basis_degree: 2,
            variance_reduction: VarianceReduction::None,
            seed: None,
        }
    }
}

impl From<MonteCarloEngine> for LongstaffSchwartz {
    fn from(engine: MonteCarloEngine) -> Self {
        Self {
            paths: engine.paths,
            time_steps: engine.time_steps,
            basis_degree: engine.basis_degree,
            variance_reduction: engine.variance_reduction,
            seed: engine.seed,
        }
    }
}

impl LongstaffSchwartz {
    /// Creates a Longstaff-Schwartz engine.
    pub fn new(paths: usize, time_steps: usize) -> Self {
        Self {
            paths,
            time_steps,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_basis_degree(mut self, basis_degree: usize) -> Self {
        self.basis_degree = basis_degree;
        self
    }

    pub fn with_variance_reduction(mut self, variance_reduction: VarianceReduction) -> Self {
        self.variance_reduction = variance_reduction;
        self
    }
}

/// Per-path outcome of the backward pass.
#[derive(Debug, Clone)]
pub(crate) struct ExercisePolicy {
    /// Cash flow discounted to `t = 0`.
    pub discounted: Vec<f64>,
    /// Paths stopped before maturity.
    pub exercised_paths: usize,
    /// Exercise dates visited before maturity.
    pub exercise_dates: usize,
    /// Dates that fell back to zero continuation value.
    pub fallbacks: usize,
}

/// Indices of paths with positive exercise value at `step`.
fn in_the_money(paths: &PathSet, payoff: &Payoff, step: usize) -> Vec<usize> {
    #[cfg(feature = "parallel")]
    let itm = (0..paths.num_paths())
        .into_par_iter()
        .filter(|&i| payoff.exercise_value(paths.value(i, step)) > 0.0)
        .collect();
    #[cfg(not(feature = "parallel"))]
    let itm = (0..paths.num_paths())
        .filter(|&i| payoff.exercise_value(paths.value(i, step)) > 0.0)
        .collect();
    itm
}

/// Fitted continuation value as a function of `x = S / K`.
#[derive(Debug, Clone, PartialEq)]
enum Continuation {
    /// Regressors without spread: the sample mean of the cash flows.
    Constant(f64),
    /// Polynomial in the standardized regressor `(x - centre) / scale`.
    Polynomial {
        centre: f64,
        scale: f64,
        coefficients: DVector<f64>,
    },
}

impl Continuation {
    #[inline]
    fn value(&self, x: f64) -> f64 {
        match self {
            Self::Constant(mean) => *mean,
            Self::Polynomial {
                centre,
                scale,
                coefficients,
            } => {
                let z = (x - centre) / scale;
                coefficients.iter().rev().fold(0.0, |acc, &c| acc.mul_add(z, c))
            }
        }
    }
}

/// Least-squares fit of `ys` on the monomial basis of the standardized `xs`.
fn regress(xs: &[f64], ys: &[f64], degree: usize) -> Result<Continuation, PricingError> {
    let n = xs.len() as f64;
    let centre = xs.iter().sum::<f64>() / n;
    let scale = (xs.iter().map(|x| (x - centre).powi(2)).sum::<f64>() / n).sqrt();
    if scale <= 1e-10 * centre.abs().max(1.0) {
        return Ok(Continuation::Constant(ys.iter().sum::<f64>() / n));
    }

    let basis = DMatrix::from_fn(xs.len(), degree + 1, |r, c| {
        ((xs[r] - centre) / scale).powi(c as i32)
    });
    let rhs = DVector::from_column_slice(ys);
    let svd = basis.svd(true, true);
    // Singular values below this are treated as zero (rank-deficient basis).
    let eps = 1e-10 * svd.singular_values.max();
    let coefficients = svd
        .solve(&rhs, eps)
        .map_err(|e| PricingError::NonFiniteResult(format!("lsm regression failed: {e}")))?;
    Ok(Continuation::Polynomial {
        centre,
        scale,
        coefficients,
    })
}

/// Runs the backward induction over a simulated path set.
pub(crate) fn exercise_policy(
    paths: &PathSet,
    market: &MarketEnvironment,
    payoff: &Payoff,
    basis_degree: usize,
) -> Result<ExercisePolicy, PricingError> {
    let n_steps = paths.num_steps();
    let n_paths = paths.num_paths();
    let dt = payoff.maturity / n_steps as f64;
    let rate = market.rate;
    let strike = payoff.strike();
    let flags = payoff.style.exercise_flags(payoff.maturity, n_steps);
    let basis_size = basis_degree + 1;

    // Undiscounted cash flow and the step at which it is received.
    let mut cash: Vec<f64> = (0..n_paths).map(|i| payoff.evaluate(paths.terminal(i))).collect();
    let mut stop = vec![n_steps; n_paths];
    let mut fallbacks = 0;
    let mut exercise_dates = 0;

    for step in (1..n_steps).rev() {
        if !flags[step] {
            continue;
        }
        exercise_dates += 1;
        let itm = in_the_money(paths, payoff, step);
        if itm.is_empty() {
            continue;
        }

        if itm.len() < basis_size {
            fallbacks += 1;
            tracing::warn!(
                step,
                itm_paths = itm.len(),
                basis_size,
                "too few in-the-money paths for regression; using zero continuation"
            );
            for &i in &itm {
                cash[i] = payoff.exercise_value(paths.value(i, step));
                stop[i] = step;
            }
            continue;
        }

        let xs: Vec<f64> = itm.iter().map(|&i| paths.value(i, step) / strike).collect();
        let ys: Vec<f64> = itm
            .iter()
            .map(|&i| cash[i] * (-rate * (stop[i] - step) as f64 * dt).exp())
            .collect();
        let fit = regress(&xs, &ys, basis_degree)?;

        for (&i, &x) in itm.iter().zip(&xs) {
            let exercise = payoff.exercise_value(paths.value(i, step));
            if exercise > fit.value(x) {
                cash[i] = exercise;
                stop[i] = step;
            }
        }
    }

    let discounted = cash
        .iter()
        .zip(&stop)
        .map(|(&c, &k)| c * (-rate * k as f64 * dt).exp())
        .collect();
    Ok(ExercisePolicy {
        discounted,
        exercised_paths: stop.iter().filter(|&&k| k < n_steps).count(),
        exercise_dates,
        fallbacks,
    })
}

impl PricingEngine for LongstaffSchwartz {
    fn price(
        &self,
        model: &Model,
        market: &MarketEnvironment,
        payoff: &Payoff,
    ) -> Result<PricingResult, PricingError> {
        payoff.validate()?;
        market.validate()?;
        validate_simulation(self.paths, self.time_steps)?;
        if payoff.is_path_dependent() {
            return Err(PricingError::UnsupportedCombination(
                "least-squares Monte Carlo cannot price path-dependent payoffs".to_string(),
            ));
        }

        let seed = resolve_seed(self.seed);
        let antithetic = matches!(self.variance_reduction, VarianceReduction::Antithetic);
        tracing::debug!(
            model = model.name(),
            paths = self.paths,
            time_steps = self.time_steps,
            basis_degree = self.basis_degree,
            variance_reduction = ?self.variance_reduction,
            seed,
            "longstaff-schwartz pricing"
        );

        let paths = PathSet::generate(
            *model,
            market,
            payoff.maturity,
            self.paths,
            self.time_steps,
            antithetic,
            seed,
        );
        let policy = exercise_policy(&paths, market, payoff, self.basis_degree)?;

        let control = match self.variance_reduction {
            VarianceReduction::ControlVariate => american_control(*model, market, payoff, &paths),
            _ => None,
        };
        let est = estimate(&policy.discounted, antithetic, control.as_ref());

        let mut price = est.mean;
        if matches!(payoff.style, ExerciseStyle::American) {
            price = price.max(payoff.exercise_value(market.spot));
        }

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::NumPaths, self.paths as f64);
        diagnostics.insert_key(DiagKey::NumTimeSteps, self.time_steps as f64);
        diagnostics.insert_key(DiagKey::EffectivePaths, est.effective as f64);
        diagnostics.insert_key(DiagKey::ExerciseDates, policy.exercise_dates as f64);
        diagnostics.insert_key(DiagKey::ExercisedPaths, policy.exercised_paths as f64);
        diagnostics.insert_key(DiagKey::RegressionFallbacks, policy.fallbacks as f64);
        if let Some(beta) = est.beta {
            diagnostics.insert_key(DiagKey::ControlBeta, beta);
        }

        PricingResult {
            price,
            stderr: Some(est.stderr),
            greeks: None,
            diagnostics,
        }
        .ensure_finite("longstaff-schwartz")
    }
}
