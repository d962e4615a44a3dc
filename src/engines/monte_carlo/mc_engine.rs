//! Monte Carlo engine for terminal and path-dependent payoffs.
//!
//! References: Glasserman (2004) ch. 4 (variance reduction); Boyle,
//! Broadie and Glasserman (1997).
//!
//! Numerical considerations:
//! - Paths use the exact transition of each model, so the only error for
//!   terminal payoffs is sampling error, reported as `stderr`. Asian payoffs
//!   additionally carry the monitoring grid of `time_steps`.
//! - Antithetic pairs are averaged before the standard error is taken, so
//!   `stderr` accounts for the pair correlation.
//! - The control-variate coefficient is estimated from the same paths,
//!   which adds an `O(1/n)` bias.
//! - Early-exercise payoffs are delegated to [`LongstaffSchwartz`].
//!
//! Use Monte Carlo for arithmetic Asians and as an independent check of the
//! grid methods. It is the slowest engine for a given accuracy on plain
//! European payoffs.

use serde::{Deserialize, Serialize};

use crate::core::{
    DiagKey, Diagnostics, ExerciseStyle, PricingEngine, PricingError, PricingResult,
};
use crate::engines::analytic::{geometric_asian_price, AnalyticEngine};
use crate::engines::lsm::LongstaffSchwartz;
use crate::engines::monte_carlo::mc_greeks::mc_greeks;
use crate::engines::monte_carlo::paths::PathSet;
use crate::instruments::{Payoff, PayoffKind};
use crate::market::MarketEnvironment;
use crate::math::{mean_and_stderr, resolve_seed};
use crate::models::Model;

/// Variance reduction scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceReduction {
    /// Plain sampling.
    #[default]
    None,
    /// Antithetic variates.
    Antithetic,
    /// Built-in control variates:
    /// - arithmetic Asian uses the geometric Asian (Black-Scholes) or the
    ///   running average itself (Bachelier);
    /// - European terminal payoffs use `S_T`;
    /// - American payoffs use the discounted European payoff.
    ControlVariate,
}

/// Monte Carlo engine over exact model transitions.
///
/// European and Asian payoffs are priced by discounted sample mean;
/// American and Bermudan payoffs are handed to [`LongstaffSchwartz`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloEngine {
    /// Number of simulated paths.
    pub paths: usize,
    /// Number of time steps per path.
    pub time_steps: usize,
    pub variance_reduction: VarianceReduction,
    /// RNG seed. `None` draws a fresh seed per call.
    pub seed: Option<u64>,
    /// Regression degree used for early-exercise payoffs.
    pub basis_degree: usize,
}

impl Default for MonteCarloEngine {
    fn default() -> Self {
        Self {
            paths: 100_000,
            time_steps: 50,
            variance_reduction: VarianceReduction::None,
            seed: None,
            basis_degree: 2,
        }
    }
}

impl MonteCarloEngine {
    /// Creates an engine with explicit path and time-step counts.
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

    /// Sets the variance reduction scheme.
    pub fn with_variance_reduction(mut self, variance_reduction: VarianceReduction) -> Self {
        self.variance_reduction = variance_reduction;
        self
    }

    pub fn with_basis_degree(mut self, basis_degree: usize) -> Self {
        self.basis_degree = basis_degree;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), PricingError> {
        validate_simulation(self.paths, self.time_steps)
    }
}

pub(crate) fn validate_simulation(paths: usize, time_steps: usize) -> Result<(), PricingError> {
    if paths == 0 {
        return Err(PricingError::InvalidSimulationConfiguration(
            "paths must be > 0".to_string(),
        ));
    }
    if time_steps == 0 {
        return Err(PricingError::InvalidSimulationConfiguration(
            "time_steps must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Sample estimate of a discounted payoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Estimate {
    pub mean: f64,
    pub stderr: f64,
    /// Number of independent samples behind `stderr`.
    pub effective: usize,
    /// Control-variate coefficient when a control was applied.
    pub beta: Option<f64>,
}

/// A control sample `Y_i` per path with known expectation.
pub(crate) struct Control {
    pub samples: Vec<f64>,
    pub expected: f64,
}

/// Averages adjacent pairs, the independent unit of an antithetic run.
fn pair_means(values: &[f64]) -> Vec<f64> {
    values
        .chunks(2)
        .map(|pair| pair.iter().sum::<f64>() / pair.len() as f64)
        .collect()
}

/// Combines per-path discounted payoffs into a price and standard error.
///
/// Antithetic partners are averaged first. With a control, `β = Cov(X,Y) /
/// Var(Y)` is estimated from the same samples and `X - β (Y - E[Y])` is
/// averaged.
pub(crate) fn estimate(samples: &[f64], antithetic: bool, control: Option<&Control>) -> Estimate {
    let xs = if antithetic {
        pair_means(samples)
    } else {
        samples.to_vec()
    };

    let Some(control) = control else {
        let (mean, stderr) = mean_and_stderr(&xs);
        return Estimate {
            mean,
            stderr,
            effective: xs.len(),
            beta: None,
        };
    };

    let ys = if antithetic {
        pair_means(&control.samples)
    } else {
        control.samples.clone()
    };
    let n = xs.len() as f64;
    let x_bar = xs.iter().sum::<f64>() / n;
    let y_bar = ys.iter().sum::<f64>() / n;
    let (mut cov, mut var_y) = (0.0, 0.0);
    for (&x, &y) in xs.iter().zip(&ys) {
        cov += (x - x_bar) * (y - y_bar);
        var_y += (y - y_bar) * (y - y_bar);
    }
    let beta = if var_y > 0.0 { cov / var_y } else { 0.0 };

    let adjusted: Vec<f64> = xs
        .iter()
        .zip(&ys)
        .map(|(&x, &y)| x - beta * (y - control.expected))
        .collect();
    let (mean, stderr) = mean_and_stderr(&adjusted);
    Estimate {
        mean,
        stderr,
        effective: adjusted.len(),
        beta: Some(beta),
    }
}

/// Discounted control samples and their exact mean for a European or Asian
/// payoff.
fn european_control(
    model: Model,
    market: &MarketEnvironment,
    payoff: &Payoff,
    paths: &PathSet,
) -> Control {
    let maturity = payoff.maturity;
    let df = market.discount(maturity);
    let fixings = &paths.times()[1..];
    let n_fix = fixings.len() as f64;

    match (&payoff.kind, model) {
        (
            PayoffKind::ArithmeticAsian {
                option_type,
                strike,
            },
            Model::BlackScholes,
        ) => {
            let expected = payoff.notional
                * geometric_asian_price(*option_type, market, *strike, fixings, maturity);
            let samples = paths
                .paths()
                .map(|path| {
                    let mean_log = path[1..].iter().map(|s| s.ln()).sum::<f64>() / n_fix;
                    df * payoff.evaluate(mean_log.exp())
                })
                .collect();
            Control { samples, expected }
        }
        (PayoffKind::ArithmeticAsian { .. }, Model::Bachelier) => {
            let expected =
                df * fixings.iter().map(|&t| model.forward(market, t)).sum::<f64>() / n_fix;
            let samples = paths
                .paths()
                .map(|path| df * path[1..].iter().sum::<f64>() / n_fix)
                .collect();
            Control { samples, expected }
        }
        _ => {
            let expected = df * model.forward(market, maturity);
            let samples = (0..paths.num_paths())
                .map(|i| df * paths.terminal(i))
                .collect();
            Control { samples, expected }
        }
    }
}

/// Discounted European payoff of each path against its analytic value; used
/// as the control for early-exercise payoffs.
pub(crate) fn american_control(
    model: Model,
    market: &MarketEnvironment,
    payoff: &Payoff,
    paths: &PathSet,
) -> Option<Control> {
    if payoff.is_path_dependent() {
        return None;
    }
    let european = payoff.clone().with_style(ExerciseStyle::European);
    let expected = AnalyticEngine::new()
        .price(&model, market, &european)
        .ok()?
        .price;
    let df = market.discount(payoff.maturity);
    let samples = (0..paths.num_paths())
        .map(|i| df * european.evaluate(paths.terminal(i)))
        .collect();
    Some(Control { samples, expected })
}

impl PricingEngine for MonteCarloEngine {
    fn price(
        &self,
        model: &Model,
        market: &MarketEnvironment,
        payoff: &Payoff,
    ) -> Result<PricingResult, PricingError> {
        payoff.validate()?;
        market.validate()?;
        self.validate()?;

        if payoff.style.allows_early_exercise() {
            return LongstaffSchwartz::from(*self).price(model, market, payoff);
        }

        let seed = resolve_seed(self.seed);
        let antithetic = matches!(self.variance_reduction, VarianceReduction::Antithetic);
        tracing::debug!(
            model = model.name(),
            paths = self.paths,
            time_steps = self.time_steps,
            variance_reduction = ?self.variance_reduction,
            seed,
            "monte carlo pricing"
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
        let df = market.discount(payoff.maturity);
        let samples: Vec<f64> = paths.paths().map(|p| df * payoff.evaluate_path(p)).collect();

        let control = match self.variance_reduction {
            VarianceReduction::ControlVariate => {
                Some(european_control(*model, market, payoff, &paths))
            }
            _ => None,
        };
        let est = estimate(&samples, antithetic, control.as_ref());

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::NumPaths, self.paths as f64);
        diagnostics.insert_key(DiagKey::NumTimeSteps, self.time_steps as f64);
        diagnostics.insert_key(DiagKey::EffectivePaths, est.effective as f64);
        diagnostics.insert_key(DiagKey::Vol, market.vol(payoff.maturity));
        if let Some(beta) = est.beta {
            diagnostics.insert_key(DiagKey::ControlBeta, beta);
        }

        PricingResult {
            price: est.mean,
            stderr: Some(est.stderr),
            greeks: mc_greeks(*model, market, payoff, &paths),
            diagnostics,
        }
        .ensure_finite("monte carlo")
    }
}
