use serde::{Deserialize, Serialize};

use crate::core::PricingError;
use crate::market::VolTermStructure;

/// Volatility source for a market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolSource {
    /// Constant volatility.
    Flat(f64),
    /// Time-dependent volatility.
    TermStructure(VolTermStructure),
}

impl VolSource {
    /// Average volatility to `t`.
    ///
    /// # Examples
    /// ```
    /// use options_pricing::market::VolSource;
    ///
    /// let vol = VolSource::Flat(0.25);
    /// assert_eq!(vol.average_vol(1.0), 0.25);
    /// ```
    pub fn average_vol(&self, t: f64) -> f64 {
        match self {
            Self::Flat(v) => *v,
            Self::TermStructure(ts) => ts.average_vol(t),
        }
    }

    /// Total variance `σ̄(t)² t`.
    pub fn total_variance(&self, t: f64) -> f64 {
        match self {
            Self::Flat(v) => v * v * t.max(0.0),
            Self::TermStructure(ts) => ts.total_variance(t),
        }
    }

    /// Integrated variance over `[t0, t1]`.
    pub fn forward_variance(&self, t0: f64, t1: f64) -> f64 {
        match self {
            Self::Flat(v) => v * v * (t1 - t0).max(0.0),
            Self::TermStructure(ts) => ts.forward_variance(t0, t1),
        }
    }

    /// Instantaneous volatility at `t`.
    pub fn instantaneous_vol(&self, t: f64) -> f64 {
        match self {
            Self::Flat(v) => *v,
            Self::TermStructure(ts) => ts.instantaneous_vol(t),
        }
    }

    /// Smallest volatility anywhere on the curve.
    pub fn min_vol(&self) -> f64 {
        match self {
            Self::Flat(v) => *v,
            Self::TermStructure(ts) => ts
                .segment_forward_vols()
                .into_iter()
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Times at which the instantaneous volatility may jump.
    pub fn breakpoints(&self) -> &[f64] {
        match self {
            Self::Flat(_) => &[],
            Self::TermStructure(ts) => ts.times(),
        }
    }

    /// The flat level, if constant.
    pub fn flat(&self) -> Option<f64> {
        match self {
            Self::Flat(v) => Some(*v),
            Self::TermStructure(_) => None,
        }
    }
}

/// Market snapshot used by all pricing engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEnvironment {
    /// Spot price.
    pub spot: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Continuously compounded dividend yield.
    pub dividend_yield: f64,
    /// Volatility source.
    pub vol: VolSource,
}

impl MarketEnvironment {
    /// Starts a market builder.
    ///
    /// # Examples
    /// ```
    /// use options_pricing::market::MarketEnvironment;
    ///
    /// let market = MarketEnvironment::builder()
    ///     .spot(100.0)
    ///     .rate(0.03)
    ///     .dividend_yield(0.01)
    ///     .flat_vol(0.20)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(market.spot(), 100.0);
    /// ```
    #[inline]
    pub fn builder() -> MarketBuilder {
        MarketBuilder::default()
    }

    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn dividend(&self) -> f64 {
        self.dividend_yield
    }

    /// Net carry `r - q`.
    #[inline]
    pub fn carry(&self) -> f64 {
        self.rate - self.dividend_yield
    }

    /// Discount factor `e^{-r t}`.
    #[inline]
    pub fn discount(&self, t: f64) -> f64 {
        (-self.rate * t).exp()
    }

    /// Average volatility to expiry.
    #[inline]
    pub fn vol(&self, expiry: f64) -> f64 {
        self.vol.average_vol(expiry)
    }

    /// Copy with a new spot.
    pub fn with_spot(&self, spot: f64) -> Self {
        Self {
            spot,
            ..self.clone()
        }
    }

    /// Copy with a new rate.
    pub fn with_rate(&self, rate: f64) -> Self {
        Self {
            rate,
            ..self.clone()
        }
    }

    /// Copy with every volatility shifted by `shift`, floored at zero. A term
    /// structure shifts the forward vol of each pillar segment.
    pub fn with_vol_shift(&self, shift: f64) -> Result<Self, PricingError> {
        let vol = match &self.vol {
            VolSource::Flat(v) => VolSource::Flat((v + shift).max(0.0)),
            VolSource::TermStructure(ts) => VolSource::TermStructure(ts.shifted(shift)?),
        };
        Ok(Self {
            vol,
            ..self.clone()
        })
    }

    /// Checks the invariants enforced by [`MarketBuilder::build`].
    pub fn validate(&self) -> Result<(), PricingError> {
        if !self.spot.is_finite() || self.spot <= 0.0 {
            return Err(PricingError::InvalidInput(
                "market spot must be finite and > 0".to_string(),
            ));
        }
        if !self.rate.is_finite() {
            return Err(PricingError::InvalidInput(
                "market rate must be finite".to_string(),
            ));
        }
        if !self.dividend_yield.is_finite() {
            return Err(PricingError::InvalidInput(
                "market dividend_yield must be finite".to_string(),
            ));
        }
        if let VolSource::Flat(v) = self.vol {
            if !v.is_finite() || v < 0.0 {
                return Err(PricingError::InvalidInput(
                    "market flat_vol must be finite and >= 0".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`MarketEnvironment`].
#[derive(Debug, Clone, Default)]
pub struct MarketBuilder {
    spot: Option<f64>,
    rate: Option<f64>,
    dividend_yield: Option<f64>,
    vol: Option<VolSource>,
}

impl MarketBuilder {
    #[inline]
    pub fn spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    #[inline]
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    #[inline]
    pub fn dividend_yield(mut self, dividend_yield: f64) -> Self {
        self.dividend_yield = Some(dividend_yield);
        self
    }

    /// Sets a flat volatility source.
    #[inline]
    pub fn flat_vol(mut self, vol: f64) -> Self {
        self.vol = Some(VolSource::Flat(vol));
        self
    }

    /// Sets a term-structure volatility source.
    pub fn vol_term_structure(mut self, term_structure: VolTermStructure) -> Self {
        self.vol = Some(VolSource::TermStructure(term_structure));
        self
    }

    /// Validates and builds a [`MarketEnvironment`].
    pub fn build(self) -> Result<MarketEnvironment, PricingError> {
        let spot = self
            .spot
            .ok_or_else(|| PricingError::InvalidInput("market spot is required".to_string()))?;
        let vol = self.vol.ok_or_else(|| {
            PricingError::InvalidInput(
                "either market flat_vol or vol_term_structure is required".to_string(),
            )
        })?;

        let market = MarketEnvironment {
            spot,
            rate: self.rate.unwrap_or(0.0),
            dividend_yield: self.dividend_yield.unwrap_or(0.0),
            vol,
        };
        market.validate()?;
        Ok(market)
    }
}
