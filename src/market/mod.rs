//! Market data container and volatility source abstractions.

#[allow(clippy::module_inception)]
mod market;
mod vol_term;

pub use market::{MarketBuilder, MarketEnvironment, VolSource};
pub use vol_term::VolTermStructure;
