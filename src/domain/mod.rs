//! Core domain types and logic.

pub mod ohlcv;
pub mod matrix;
pub mod dataset;
pub mod signal;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
