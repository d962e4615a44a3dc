//! Closed-form analytic pricing.

pub mod asian_geometric;
pub mod bachelier;
pub mod black_scholes;
pub mod digital;
pub mod engine;

pub use asian_geometric::geometric_asian_price;
pub use bachelier::{bachelier_greeks, bachelier_price};
pub use black_scholes::{bs_greeks, bs_price};
pub use digital::{
    bachelier_digital_greeks, bachelier_digital_price, bs_digital_greeks, bs_digital_price,
};
pub use engine::AnalyticEngine;
