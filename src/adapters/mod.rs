//! Concrete adapter implementations for ports.

pub mod cache;
pub mod coingecko_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod rate_limiter;
pub mod reqwest_http_adapter;
pub mod system_clock_adapter;
