//! Day-count conventions used to turn calendar maturities into year fractions.
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::PricingError;

/// Supported day-count conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DayCount {
    /// Actual days over a 365-day year.
    #[default]
    #[serde(rename = "ACT/365")]
    Act365,
    /// Actual days over a 360-day year.
    #[serde(rename = "ACT/360")]
    Act360,
    /// 30/360 with both day-of-month values capped at 30.
    #[serde(rename = "30/360")]
    Thirty360,
}

impl FromStr for DayCount {
    type Err = PricingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACT/365" | "ACT/365F" => Ok(Self::Act365),
            "ACT/360" => Ok(Self::Act360),
            "30/360" => Ok(Self::Thirty360),
            other => Err(PricingError::InvalidInput(format!(
                "unsupported day count convention: {other:?}"
            ))),
        }
    }
}

/// Computes the year fraction between two dates.
///
/// The result is negative when `end` precedes `start`.
///
/// # Examples
/// ```rust
/// use chrono::NaiveDate;
/// use options_pricing::time::{year_fraction, DayCount};
///
/// let s = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let e = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
/// assert_eq!(year_fraction(s, e, DayCount::Act365), 1.0);
/// ```
pub fn year_fraction(start: NaiveDate, end: NaiveDate, convention: DayCount) -> f64 {
    match convention {
        DayCount::Act365 => (end - start).num_days() as f64 / 365.0,
        DayCount::Act360 => (end - start).num_days() as f64 / 360.0,
        DayCount::Thirty360 => {
            let d1 = start.day().min(30) as i64;
            let d2 = end.day().min(30) as i64;
            let days = 360 * (end.year() - start.year()) as i64
                + 30 * (end.month() as i64 - start.month() as i64)
                + (d2 - d1);
            days as f64 / 360.0
        }
    }
}
