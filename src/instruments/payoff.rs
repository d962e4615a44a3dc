//! Option contract definition shared by every engine.
//!
//! [`Payoff`] pairs a [`PayoffKind`] (vanilla, cash-or-nothing digital or
//! arithmetic-average Asian) with exercise rights, a maturity in year fractions
//! and a notional. Engines never inspect the kind beyond the helpers below,
//! so adding a payoff means extending the match arms here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::{ExerciseStyle, OptionType, PricingError};
use crate::time::{year_fraction, DayCount};

/// Payoff shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayoffKind {
    /// `max(±(S_T - K), 0)`.
    Vanilla { option_type: OptionType, strike: f64 },
    /// Pays `cash` when the option finishes strictly in the money.
    CashOrNothing {
        option_type: OptionType,
        strike: f64,
        cash: f64,
    },
    /// `max(±(A - K), 0)` on the arithmetic average of the monitoring dates
    /// `t_1..t_n` (the spot at `t_0` is excluded).
    ArithmeticAsian { option_type: OptionType, strike: f64 },
}

/// Option contract.
///
/// # Examples
/// ```
/// use options_pricing::instruments::Payoff;
///
/// let call = Payoff::european_call(100.0, 1.0);
/// assert!(call.validate().is_ok());
/// assert_eq!(call.evaluate(110.0), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payoff {
    pub kind: PayoffKind,
    pub style: ExerciseStyle,
    /// Maturity in years.
    pub maturity: f64,
    pub notional: f64,
}

impl Payoff {
    pub fn new(kind: PayoffKind, style: ExerciseStyle, maturity: f64) -> Self {
        Self {
            kind,
            style,
            maturity,
            notional: 1.0,
        }
    }

    /// Builds a payoff whose maturity is the year fraction between two dates.
    pub fn from_dates(
        kind: PayoffKind,
        style: ExerciseStyle,
        valuation: NaiveDate,
        maturity: NaiveDate,
        day_count: DayCount,
    ) -> Result<Self, PricingError> {
        let payoff = Self::new(kind, style, year_fraction(valuation, maturity, day_count));
        payoff.validate()?;
        Ok(payoff)
    }

    pub fn european_call(strike: f64, maturity: f64) -> Self {
        Self::vanilla(OptionType::Call, strike, ExerciseStyle::European, maturity)
    }

    pub fn european_put(strike: f64, maturity: f64) -> Self {
        Self::vanilla(OptionType::Put, strike, ExerciseStyle::European, maturity)
    }

    pub fn american_call(strike: f64, maturity: f64) -> Self {
        Self::vanilla(OptionType::Call, strike, ExerciseStyle::American, maturity)
    }

    pub fn american_put(strike: f64, maturity: f64) -> Self {
        Self::vanilla(OptionType::Put, strike, ExerciseStyle::American, maturity)
    }

    pub fn vanilla(
        option_type: OptionType,
        strike: f64,
        style: ExerciseStyle,
        maturity: f64,
    ) -> Self {
        Self::new(
            PayoffKind::Vanilla {
                option_type,
                strike,
            },
            style,
            maturity,
        )
    }

    /// European cash-or-nothing call paying `cash`.
    pub fn digital_call(strike: f64, cash: f64, maturity: f64) -> Self {
        Self::new(
            PayoffKind::CashOrNothing {
                option_type: OptionType::Call,
                strike,
                cash,
            },
            ExerciseStyle::European,
            maturity,
        )
    }

    /// European cash-or-nothing put paying `cash`.
    pub fn digital_put(strike: f64, cash: f64, maturity: f64) -> Self {
        Self::new(
            PayoffKind::CashOrNothing {
                option_type: OptionType::Put,
                strike,
                cash,
            },
            ExerciseStyle::European,
            maturity,
        )
    }

    /// European arithmetic-average call.
    pub fn asian_call(strike: f64, maturity: f64) -> Self {
        Self::new(
            PayoffKind::ArithmeticAsian {
                option_type: OptionType::Call,
                strike,
            },
            ExerciseStyle::European,
            maturity,
        )
    }

    /// European arithmetic-average put.
    pub fn asian_put(strike: f64, maturity: f64) -> Self {
        Self::new(
            PayoffKind::ArithmeticAsian {
                option_type: OptionType::Put,
                strike,
            },
            ExerciseStyle::European,
            maturity,
        )
    }

    pub fn with_notional(mut self, notional: f64) -> Self {
        self.notional = notional;
        self
    }

    pub fn with_style(mut self, style: ExerciseStyle) -> Self {
        self.style = style;
        self
    }

    /// Copy with a new time to maturity, as if the valuation date moved.
    ///
    /// Bermudan dates move with maturity; dates that fall at or before the
    /// valuation date are dropped.
    pub fn with_maturity(&self, maturity: f64) -> Self {
        let shift = maturity - self.maturity;
        let style = match &self.style {
            ExerciseStyle::Bermudan { dates } => {
                let mut moved: Vec<f64> = dates
                    .iter()
                    .map(|&t| (t + shift).min(maturity))
                    .filter(|&t| t > 0.0)
                    .collect();
                if moved.is_empty() {
                    moved.push(maturity);
                }
                ExerciseStyle::Bermudan { dates: moved }
            }
            style => style.clone(),
        };
        Self {
            maturity,
            style,
            ..self.clone()
        }
    }

    #[inline]
    pub fn strike(&self) -> f64 {
        match self.kind {
            PayoffKind::Vanilla { strike, .. }
            | PayoffKind::CashOrNothing { strike, .. }
            | PayoffKind::ArithmeticAsian { strike, .. } => strike,
        }
    }

    #[inline]
    pub fn option_type(&self) -> OptionType {
        match self.kind {
            PayoffKind::Vanilla { option_type, .. }
            | PayoffKind::CashOrNothing { option_type, .. }
            | PayoffKind::ArithmeticAsian { option_type, .. } => option_type,
        }
    }

    #[inline]
    pub fn is_path_dependent(&self) -> bool {
        matches!(self.kind, PayoffKind::ArithmeticAsian { .. })
    }

    #[inline]
    pub fn is_digital(&self) -> bool {
        matches!(self.kind, PayoffKind::CashOrNothing { .. })
    }

    /// Payoff per unit notional of a terminal (or averaged) level.
    #[inline]
    fn unit_value(&self, level: f64) -> f64 {
        match self.kind {
            PayoffKind::Vanilla {
                option_type,
                strike,
            }
            | PayoffKind::ArithmeticAsian {
                option_type,
                strike,
            } => (option_type.sign() * (level - strike)).max(0.0),
            PayoffKind::CashOrNothing {
                option_type,
                strike,
                cash,
            } => {
                let in_the_money = match option_type {
                    OptionType::Call => level > strike,
                    OptionType::Put => level < strike,
                };
                if in_the_money {
                    cash
                } else {
                    0.0
                }
            }
        }
    }

    /// Terminal payoff (notional included). For the Asian kind `level` is the
    /// realized average.
    #[inline]
    pub fn evaluate(&self, level: f64) -> f64 {
        self.notional * self.unit_value(level)
    }

    /// Average of the terminal payoff over the grid cell `[lo, hi]` owned by
    /// `node`, by the trapezoid rule on each side of the strike.
    ///
    /// Cells that do not straddle the strike return the node value. A digital
    /// keeps its jump, so the cell sees the fraction of its width that is in
    /// the money instead of the value at a single point.
    pub fn cell_average(&self, node: f64, lo: f64, hi: f64) -> f64 {
        let strike = self.strike();
        if strike <= lo || strike >= hi {
            return self.evaluate(node);
        }
        let (f_lo, f_hi) = (self.evaluate(lo), self.evaluate(hi));
        let (left, right) = if self.is_digital() {
            (f_lo, f_hi)
        } else {
            let at = self.evaluate(strike);
            (at, at)
        };
        (0.5 * (f_lo + left) * (strike - lo) + 0.5 * (right + f_hi) * (hi - strike)) / (hi - lo)
    }

    /// Terminal value on a lattice node. A digital whose node sits on the
    /// strike pays the mean of its one-sided limits.
    pub fn evaluate_node(&self, level: f64) -> f64 {
        if let PayoffKind::CashOrNothing { strike, cash, .. } = self.kind {
            if (level - strike).abs() <= 1e-9 * strike.abs().max(1.0) {
                return 0.5 * self.notional * cash;
            }
        }
        self.evaluate(level)
    }

    /// Payoff of a full path `[S(t_0), S(t_1), ..., S(t_n)]`.
    pub fn evaluate_path(&self, path: &[f64]) -> f64 {
        match self.kind {
            PayoffKind::ArithmeticAsian { .. } => {
                let monitored = if path.len() > 1 { &path[1..] } else { path };
                let average = monitored.iter().sum::<f64>() / monitored.len().max(1) as f64;
                self.evaluate(average)
            }
            _ => path.last().map_or(0.0, |&s| self.evaluate(s)),
        }
    }

    /// Value received on early exercise at `spot`.
    #[inline]
    pub fn exercise_value(&self, spot: f64) -> f64 {
        self.evaluate(spot)
    }

    /// Validates contract fields.
    ///
    /// # Errors
    /// Returns [`PricingError::InvalidInput`] when:
    /// - `strike <= 0`, `maturity <= 0`, `notional <= 0` or `cash < 0`
    /// - Bermudan exercise dates are empty or outside `(0, maturity]`
    /// - a path-dependent payoff carries early exercise
    pub fn validate(&self) -> Result<(), PricingError> {
        let strike = self.strike();
        if !strike.is_finite() || strike <= 0.0 {
            return Err(PricingError::InvalidInput(
                "payoff strike must be finite and > 0".to_string(),
            ));
        }
        if !self.maturity.is_finite() || self.maturity <= 0.0 {
            return Err(PricingError::InvalidInput(
                "payoff maturity must be finite and > 0".to_string(),
            ));
        }
        if !self.notional.is_finite() || self.notional <= 0.0 {
            return Err(PricingError::InvalidInput(
                "payoff notional must be finite and > 0".to_string(),
            ));
        }
        if let PayoffKind::CashOrNothing { cash, .. } = self.kind {
            if !cash.is_finite() || cash < 0.0 {
                return Err(PricingError::InvalidInput(
                    "digital cash amount must be finite and >= 0".to_string(),
                ));
            }
        }
        if let ExerciseStyle::Bermudan { dates } = &self.style {
            if dates.is_empty() {
                return Err(PricingError::InvalidInput(
                    "bermudan exercise dates cannot be empty".to_string(),
                ));
            }
            if dates
                .iter()
                .any(|&t| !t.is_finite() || t <= 0.0 || t > self.maturity)
            {
                return Err(PricingError::InvalidInput(
                    "bermudan exercise dates must lie in (0, maturity]".to_string(),
                ));
            }
        }
        if self.is_path_dependent() && self.style.allows_early_exercise() {
            return Err(PricingError::InvalidInput(
                "path-dependent payoffs must be European".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanilla_and_digital_values() {
        let put = Payoff::european_put(100.0, 1.0).with_notional(10.0);
        assert_eq!(put.evaluate(90.0), 100.0);
        assert_eq!(put.evaluate(110.0), 0.0);

        let digital = Payoff::digital_call(100.0, 5.0, 1.0);
        assert_eq!(digital.evaluate(100.0), 0.0);
        assert_eq!(digital.evaluate(100.01), 5.0);
    }

    #[test]
    fn cell_straddling_the_strike_is_averaged() {
        // A quarter of [98, 106] lies below the strike.
        let digital = Payoff::digital_call(100.0, 4.0, 1.0);
        assert!((digital.cell_average(101.0, 98.0, 106.0) - 3.0).abs() < 1e-12);
        assert_eq!(digital.cell_average(110.0, 108.0, 112.0), 4.0);

        // Put over [96, 104]: kink midpoint, trapezoid gives (4 * 2) / 8.
        let put = Payoff::european_put(100.0, 1.0).with_notional(2.0);
        assert!((put.cell_average(100.0, 96.0, 104.0) - 2.0).abs() < 1e-12);
        assert_eq!(put.cell_average(90.0, 89.0, 91.0), 20.0);
    }

    #[test]
    fn digital_on_the_strike_node_pays_half() {
        let digital = Payoff::digital_put(100.0, 6.0, 1.0).with_notional(2.0);
        assert_eq!(digital.evaluate_node(100.0), 6.0);
        assert_eq!(digital.evaluate_node(99.0), 12.0);
        assert_eq!(Payoff::european_call(100.0, 1.0).evaluate_node(100.0), 0.0);
    }

    #[test]
    fn asian_excludes_initial_spot() {
        let asian = Payoff::asian_call(100.0, 1.0);
        assert_eq!(asian.evaluate_path(&[1000.0, 100.0, 110.0, 120.0]), 10.0);
        let euro = Payoff::european_call(100.0, 1.0);
        assert_eq!(euro.evaluate_path(&[1000.0, 100.0, 110.0, 120.0]), 20.0);
    }

    #[test]
    fn validation_rules() {
        assert!(Payoff::european_call(0.0, 1.0).validate().is_err());
        assert!(Payoff::european_call(100.0, 0.0).validate().is_err());
        assert!(Payoff::european_call(100.0, 1.0)
            .with_notional(-1.0)
            .validate()
            .is_err());
        assert!(Payoff::asian_call(100.0, 1.0)
            .with_style(ExerciseStyle::American)
            .validate()
            .is_err());
        assert!(Payoff::european_put(100.0, 1.0)
            .with_style(ExerciseStyle::Bermudan {
                dates: vec![0.5, 1.5]
            })
            .validate()
            .is_err());
        assert!(Payoff::digital_put(100.0, -1.0, 1.0).validate().is_err());
    }

    #[test]
    fn maturity_from_calendar_dates() {
        let kind = PayoffKind::Vanilla {
            option_type: OptionType::Call,
            strike: 100.0,
        };
        let payoff = Payoff::from_dates(
            kind,
            ExerciseStyle::European,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            DayCount::Act360,
        )
        .unwrap();
        assert!((payoff.maturity - 181.0 / 360.0).abs() < 1e-15);

        let expired = Payoff::from_dates(
            PayoffKind::Vanilla {
                option_type: OptionType::Put,
                strike: 100.0,
            },
            ExerciseStyle::European,
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            DayCount::Act365,
        );
        assert!(expired.is_err());
    }

    #[test]
    fn shifting_maturity_moves_bermudan_dates() {
        let payoff = Payoff::european_put(100.0, 1.0).with_style(ExerciseStyle::Bermudan {
            dates: vec![0.001, 0.5, 1.0],
        });
        let shorter = payoff.with_maturity(0.99);
        assert!(shorter.validate().is_ok());
        match shorter.style {
            ExerciseStyle::Bermudan { dates } => {
                assert_eq!(dates.len(), 2);
                assert!((dates[1] - 0.99).abs() < 1e-15);
            }
            other => panic!("unexpected style {other:?}"),
        }
    }
}
