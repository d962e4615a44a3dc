//! Least-squares Monte Carlo pricing engines.

pub mod longstaff_schwartz;

pub use longstaff_schwartz::LongstaffSchwartz;
