//! Time-dependent volatility term structure.
//!
//! Pillars carry Black (average) volatilities. Total variance `w(t) = σ(t)² t`
//! is linearly interpolated between pillars, which keeps the implied forward
//! variance piecewise constant and non-negative for arbitrage-free input.

use serde::{Deserialize, Serialize};

use crate::core::PricingError;

/// Volatility term structure over year fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolTermStructure {
    times: Vec<f64>,
    vols: Vec<f64>,
    total_variances: Vec<f64>,
}

impl VolTermStructure {
    /// Builds a term structure from `(time, vol)` pillars.
    ///
    /// Times must be strictly increasing and positive; vols finite and
    /// non-negative; total variance non-decreasing.
    pub fn new(pillars: Vec<(f64, f64)>) -> Result<Self, PricingError> {
        if pillars.is_empty() {
            return Err(PricingError::InvalidInput(
                "vol term structure needs at least one pillar".to_string(),
            ));
        }

        let mut times = Vec::with_capacity(pillars.len());
        let mut vols = Vec::with_capacity(pillars.len());
        let mut total_variances = Vec::with_capacity(pillars.len());
        let mut prev_t = 0.0;
        let mut prev_w = 0.0;

        for (t, vol) in pillars {
            if !t.is_finite() || t <= prev_t {
                return Err(PricingError::InvalidInput(format!(
                    "vol pillar times must be positive and strictly increasing (got {t})"
                )));
            }
            if !vol.is_finite() || vol < 0.0 {
                return Err(PricingError::InvalidInput(format!(
                    "vol pillar at t={t} must be finite and >= 0 (got {vol})"
                )));
            }
            let w = vol * vol * t;
            if w < prev_w - 1e-14 {
                return Err(PricingError::InvalidInput(format!(
                    "total variance decreases at t={t} (calendar arbitrage)"
                )));
            }
            times.push(t);
            vols.push(vol);
            total_variances.push(w);
            prev_t = t;
            prev_w = w;
        }

        Ok(Self {
            times,
            vols,
            total_variances,
        })
    }

    /// Pillar times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Pillar volatilities.
    pub fn vols(&self) -> &[f64] {
        &self.vols
    }

    /// Total implied variance `w(t)`.
    pub fn total_variance(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let n = self.times.len();
        if t <= self.times[0] {
            return self.vols[0] * self.vols[0] * t;
        }
        if t >= self.times[n - 1] {
            return self.vols[n - 1] * self.vols[n - 1] * t;
        }

        let idx = self.times.partition_point(|&x| x < t);
        let (t0, t1) = (self.times[idx - 1], self.times[idx]);
        let (w0, w1) = (self.total_variances[idx - 1], self.total_variances[idx]);
        w0 + (w1 - w0) * (t - t0) / (t1 - t0)
    }

    /// Average (Black) volatility to `t`.
    pub fn average_vol(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return self.vols[0];
        }
        (self.total_variance(t) / t).max(0.0).sqrt()
    }

    /// Integrated variance between `t0` and `t1`.
    pub fn forward_variance(&self, t0: f64, t1: f64) -> f64 {
        (self.total_variance(t1) - self.total_variance(t0)).max(0.0)
    }

    /// Forward volatility between `t0` and `t1`.
    pub fn forward_vol(&self, t0: f64, t1: f64) -> f64 {
        let dt = t1 - t0;
        if dt <= 0.0 {
            return self.instantaneous_vol(t0);
        }
        (self.forward_variance(t0, t1) / dt).sqrt()
    }

    /// Local (instantaneous) vol: square root of `dw/dt` on the active segment.
    pub fn instantaneous_vol(&self, t: f64) -> f64 {
        let n = self.times.len();
        if t < self.times[0] {
            return self.vols[0];
        }
        if t >= self.times[n - 1] {
            return self.vols[n - 1];
        }
        let idx = self.times.partition_point(|&x| x <= t);
        let (t0, t1) = (self.times[idx - 1], self.times[idx]);
        let (w0, w1) = (self.total_variances[idx - 1], self.total_variances[idx]);
        ((w1 - w0) / (t1 - t0)).max(0.0).sqrt()
    }

    /// Forward volatilities of the pillar segments `[t_{i-1}, t_i]`, `t_0 = 0`.
    pub fn segment_forward_vols(&self) -> Vec<f64> {
        let mut prev = 0.0;
        self.times
            .iter()
            .map(|&t| {
                let v = self.forward_vol(prev, t);
                prev = t;
                v
            })
            .collect()
    }

    /// Parallel shift of the forward vol of every pillar segment, floored at
    /// zero. Total variance stays non-decreasing, so the result is always a
    /// valid curve; a single pillar shifts like a flat vol.
    pub fn shifted(&self, shift: f64) -> Result<Self, PricingError> {
        let mut prev_t = 0.0;
        let mut w = 0.0;
        let pillars = self
            .times
            .iter()
            .zip(self.segment_forward_vols())
            .map(|(&t, forward)| {
                let v = (forward + shift).max(0.0);
                w += v * v * (t - prev_t);
                prev_t = t;
                (t, (w / t).sqrt())
            })
            .collect();
        Self::new(pillars)
    }
}
