//! JSON helpers for configuration and result payloads.
//!
//! Every public configuration type ([`crate::pricing::MethodConfig`] and the
//! per-engine configs) and [`crate::core::PricingResult`] derive serde, so a
//! caller can keep method settings in a JSON file and log results as JSON.
//!
//! # Examples
//! ```rust
//! use options_pricing::core::{from_json, to_json_pretty};
//! use options_pricing::pricing::{MethodConfig, TreeConfig};
//!
//! let config = MethodConfig::Tree(TreeConfig::binomial(500));
//! let json = to_json_pretty(&config).expect("json serialization");
//! let decoded: MethodConfig = from_json(&json).expect("json deserialization");
//! assert_eq!(decoded, config);
//! ```

use serde::de::DeserializeOwned;

use crate::core::PricingError;

/// Serializes `value` as pretty-printed JSON.
pub fn to_json_pretty<T: serde::Serialize>(value: &T) -> Result<String, PricingError> {
    serde_json::to_string_pretty(value).map_err(|e| PricingError::Serialization(e.to_string()))
}

/// Deserializes a JSON payload.
pub fn from_json<T: DeserializeOwned>(payload: &str) -> Result<T, PricingError> {
    serde_json::from_str(payload).map_err(|e| PricingError::Serialization(e.to_string()))
}
