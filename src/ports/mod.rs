//! Port traits at the I/O seams: market data in, configuration, results out.

pub mod config_port;
pub mod data_port;
pub mod report_port;
