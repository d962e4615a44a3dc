//! Engine trait, result payload, Greek identifiers, diagnostics and errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::instruments::Payoff;
use crate::market::MarketEnvironment;
use crate::models::Model;

/// Sensitivity identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Greek {
    /// First derivative to spot.
    Delta,
    /// Second derivative to spot.
    Gamma,
    /// First derivative to volatility.
    Vega,
    /// First derivative to calendar time (`-dV/dT`).
    Theta,
    /// First derivative to rate.
    Rho,
}

impl Greek {
    /// Every supported Greek, in canonical order.
    pub const ALL: [Greek; 5] = [
        Greek::Delta,
        Greek::Gamma,
        Greek::Vega,
        Greek::Theta,
        Greek::Rho,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delta => "delta",
            Self::Gamma => "gamma",
            Self::Vega => "vega",
            Self::Theta => "theta",
            Self::Rho => "rho",
        }
    }
}

impl std::fmt::Display for Greek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Greek name to value.
pub type GreekMap = BTreeMap<Greek, f64>;

/// Full closed-form Greek set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
}

impl Greeks {
    /// All-zero Greeks, used for expired or deterministic contracts.
    pub const ZERO: Greeks = Greeks {
        delta: 0.0,
        gamma: 0.0,
        vega: 0.0,
        theta: 0.0,
        rho: 0.0,
    };

    #[inline]
    pub fn get(&self, greek: Greek) -> f64 {
        match greek {
            Greek::Delta => self.delta,
            Greek::Gamma => self.gamma,
            Greek::Vega => self.vega,
            Greek::Theta => self.theta,
            Greek::Rho => self.rho,
        }
    }

    /// Scales every sensitivity, e.g. by the contract notional.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            vega: self.vega * factor,
            theta: self.theta * factor,
            rho: self.rho * factor,
        }
    }

    pub fn to_map(&self) -> GreekMap {
        Greek::ALL.iter().map(|&g| (g, self.get(g))).collect()
    }
}

/// Pricing engine abstraction over the (model, market, payoff) triple.
///
/// Engines hold numeric configuration only; the inputs are borrowed for a
/// single call and never retained.
pub trait PricingEngine {
    /// Prices `payoff` under `model` and `market`.
    fn price(
        &self,
        model: &Model,
        market: &MarketEnvironment,
        payoff: &Payoff,
    ) -> Result<PricingResult, PricingError>;
}

/// Compact key set for engine diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagKey {
    ControlBeta,
    D,
    EffectivePaths,
    ExerciseDates,
    ExercisedPaths,
    NumPaths,
    NumPriceSteps,
    NumSteps,
    NumTimeSteps,
    Pd,
    Pm,
    Pu,
    RegressionFallbacks,
    SMax,
    SMin,
    U,
    Vol,
}

impl DiagKey {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ControlBeta => "control_beta",
            Self::D => "d",
            Self::EffectivePaths => "effective_paths",
            Self::ExerciseDates => "exercise_dates",
            Self::ExercisedPaths => "exercised_paths",
            Self::NumPaths => "num_paths",
            Self::NumPriceSteps => "num_price_steps",
            Self::NumSteps => "num_steps",
            Self::NumTimeSteps => "num_time_steps",
            Self::Pd => "pd",
            Self::Pm => "pm",
            Self::Pu => "pu",
            Self::RegressionFallbacks => "regression_fallbacks",
            Self::SMax => "s_max",
            Self::SMin => "s_min",
            Self::U => "u",
            Self::Vol => "vol",
        }
    }
}

impl std::str::FromStr for DiagKey {
    type Err = ();

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "control_beta" => Ok(Self::ControlBeta),
            "d" => Ok(Self::D),
            "effective_paths" => Ok(Self::EffectivePaths),
            "exercise_dates" => Ok(Self::ExerciseDates),
            "exercised_paths" => Ok(Self::ExercisedPaths),
            "num_paths" => Ok(Self::NumPaths),
            "num_price_steps" => Ok(Self::NumPriceSteps),
            "num_steps" => Ok(Self::NumSteps),
            "num_time_steps" => Ok(Self::NumTimeSteps),
            "pd" => Ok(Self::Pd),
            "pm" => Ok(Self::Pm),
            "pu" => Ok(Self::Pu),
            "regression_fallbacks" => Ok(Self::RegressionFallbacks),
            "s_max" => Ok(Self::SMax),
            "s_min" => Ok(Self::SMin),
            "u" => Ok(Self::U),
            "vol" => Ok(Self::Vol),
            _ => Err(()),
        }
    }
}

/// Inline diagnostics storage used in [`PricingResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: [Option<(DiagKey, f64)>; 8],
}

impl Diagnostics {
    pub const CAPACITY: usize = 8;

    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries[0].is_none()
    }

    /// Inserts or overwrites `key`. Entries beyond [`Self::CAPACITY`] are
    /// dropped; engines never record more keys than that.
    #[inline]
    pub fn insert_key(&mut self, key: DiagKey, value: f64) -> Option<f64> {
        for (entry_key, existing) in self.entries.iter_mut().flatten() {
            if *entry_key == key {
                let prev = *existing;
                *existing = value;
                return Some(prev);
            }
        }

        if let Some(slot) = self.entries.iter_mut().find(|e| e.is_none()) {
            *slot = Some((key, value));
        } else {
            debug_assert!(false, "diagnostics capacity exceeded ({})", Self::CAPACITY);
        }
        None
    }

    #[inline]
    fn iter_entries(&self) -> impl Iterator<Item = &(DiagKey, f64)> {
        self.entries.iter().filter_map(Option::as_ref)
    }

    #[inline]
    pub fn get_key(&self, key: DiagKey) -> Option<f64> {
        self.iter_entries()
            .find_map(|(entry_key, value)| (*entry_key == key).then_some(*value))
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<f64> {
        let key: DiagKey = key.parse().ok()?;
        self.get_key(key)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.iter_entries().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Unified engine result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    /// Present value, in the currency units of the market spot.
    pub price: f64,
    /// Standard error (Monte Carlo only).
    pub stderr: Option<f64>,
    /// Greeks the engine produced alongside the price.
    pub greeks: Option<GreekMap>,
    /// Engine-specific scalar diagnostics.
    pub diagnostics: Diagnostics,
}

impl PricingResult {
    /// Price-only result.
    pub fn from_price(price: f64) -> Self {
        Self {
            price,
            stderr: None,
            greeks: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Fails with [`PricingError::NonFiniteResult`] if the price, standard
    /// error or any Greek is NaN or infinite.
    pub fn ensure_finite(self, context: &str) -> Result<Self, PricingError> {
        if !self.price.is_finite() {
            return Err(PricingError::NonFiniteResult(format!(
                "{context}: price is {}",
                self.price
            )));
        }
        if let Some(se) = self.stderr {
            if !se.is_finite() {
                return Err(PricingError::NonFiniteResult(format!(
                    "{context}: standard error is {se}"
                )));
            }
        }
        if let Some(greeks) = &self.greeks {
            if let Some((g, v)) = greeks.iter().find(|(_, v)| !v.is_finite()) {
                return Err(PricingError::NonFiniteResult(format!(
                    "{context}: {g} is {v}"
                )));
            }
        }
        Ok(self)
    }
}

/// Engine and model errors surfaced by the API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    /// The analytic (or another) method cannot solve this model/payoff pair.
    #[error("unsupported combination: {0}")]
    UnsupportedCombination(String),
    /// Tree step count is not positive.
    #[error("invalid step count: {0}")]
    InvalidStepCount(String),
    /// PDE grid dimensions or domain are malformed.
    #[error("invalid grid configuration: {0}")]
    InvalidGridConfiguration(String),
    /// Monte Carlo path/step counts or options are malformed.
    #[error("invalid simulation configuration: {0}")]
    InvalidSimulationConfiguration(String),
    /// A computed value is NaN or infinite.
    #[error("non-finite result: {0}")]
    NonFiniteResult(String),
    /// Market or payoff validation error.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Configuration payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_overwrite_existing_key() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_empty());
        assert_eq!(diag.insert_key(DiagKey::NumSteps, 10.0), None);
        assert_eq!(diag.insert_key(DiagKey::NumSteps, 20.0), Some(10.0));
        assert_eq!(diag.len(), 1);
        assert_eq!(diag.get("num_steps"), Some(20.0));
        assert_eq!(diag.get("unknown"), None);
    }

    #[test]
    fn ensure_finite_flags_nan_greek() {
        let mut greeks = GreekMap::new();
        greeks.insert(Greek::Gamma, f64::NAN);
        let result = PricingResult {
            price: 1.0,
            stderr: None,
            greeks: Some(greeks),
            diagnostics: Diagnostics::new(),
        };
        let err = result.ensure_finite("test").unwrap_err();
        assert!(matches!(err, PricingError::NonFiniteResult(_)));
    }

    #[test]
    fn greeks_map_has_every_entry() {
        let g = Greeks {
            delta: 0.5,
            gamma: 0.02,
            vega: 37.0,
            theta: -6.0,
            rho: 50.0,
        };
        let map = g.to_map();
        assert_eq!(map.len(), 5);
        assert_eq!(map[&Greek::Vega], 37.0);
    }
}
