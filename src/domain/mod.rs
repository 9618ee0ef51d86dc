//! Core domain types and logic.

pub mod advisor;
pub mod cancellation;
pub mod coin;
pub mod config_validation;
pub mod error;
pub mod features;
pub mod model;
pub mod price_series;
pub mod scorer;
