//! Port traits at the crate's I/O seams.

pub mod clock_port;
pub mod config_port;
pub mod http_port;
pub mod market_data_port;
