//! Instrument definitions priced by the engines.

pub mod payoff;

pub use payoff::{Payoff, PayoffKind};
