//! Option side and exercise style.
//!
//! Both parse case-insensitively from strings (`"call"`, `"P"`,
//! `"american"`) so run files and command lines can name them freely.
//! [`ExerciseStyle::exercise_flags`] maps exercise rights onto the time grid
//! of an engine: American exercises at every step, Bermudan dates snap to the
//! nearest step, European only at maturity.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PricingError;

/// Plain-vanilla option side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    /// Call option payoff profile.
    Call,
    /// Put option payoff profile.
    Put,
}

impl OptionType {
    /// Returns +1.0 for calls and -1.0 for puts.
    pub fn sign(self) -> f64 {
        match self {
            Self::Call => 1.0,
            Self::Put => -1.0,
        }
    }
}

impl FromStr for OptionType {
    type Err = PricingError;

    /// Case-insensitive: accepts `c`/`call` and `p`/`put`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "c" | "call" => Ok(Self::Call),
            "p" | "put" => Ok(Self::Put),
            other => Err(PricingError::InvalidInput(format!(
                "unknown option type: {other:?}"
            ))),
        }
    }
}

/// Exercise rights for an option contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseStyle {
    /// Exercise only at expiry.
    European,
    /// Exercise at any time up to expiry.
    American,
    /// Exercise at specific times (in year fractions).
    Bermudan { dates: Vec<f64> },
}

impl ExerciseStyle {
    /// True when the holder may exercise before maturity.
    #[inline]
    pub fn allows_early_exercise(&self) -> bool {
        !matches!(self, Self::European)
    }

    /// Flags the time steps `0..=steps` at which exercise is allowed.
    ///
    /// Bermudan dates snap to the nearest step; maturity is always exercisable
    /// and `t = 0` never is (the engines compare against immediate exercise
    /// separately).
    pub fn exercise_flags(&self, maturity: f64, steps: usize) -> Vec<bool> {
        let mut flags = vec![false; steps + 1];
        match self {
            Self::European => {}
            Self::American => {
                for flag in flags.iter_mut().skip(1) {
                    *flag = true;
                }
            }
            Self::Bermudan { dates } => {
                for &t in dates {
                    if maturity <= 0.0 {
                        continue;
                    }
                    let idx = ((t / maturity) * steps as f64).round() as usize;
                    flags[idx.clamp(1, steps)] = true;
                }
            }
        }
        flags[steps] = true;
        flags
    }
}

impl FromStr for ExerciseStyle {
    type Err = PricingError;

    /// Case-insensitive: accepts `e`/`euro`/`european` and `a`/`amer`/`american`.
    ///
    /// Bermudan schedules carry dates and cannot be parsed from a bare name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "e" | "euro" | "european" => Ok(Self::European),
            "a" | "amer" | "american" => Ok(Self::American),
            "b" | "bermudan" => Err(PricingError::InvalidInput(
                "bermudan style needs an explicit exercise schedule".to_string(),
            )),
            other => Err(PricingError::InvalidInput(format!(
                "unknown exercise style: {other:?}"
            ))),
        }
    }
}
