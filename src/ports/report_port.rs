//! Result sink port.

use crate::domain::error::BacktestError;
use crate::domain::matrix::DateMatrix;
use crate::domain::metrics::EquityPoint;
use std::path::Path;

/// Port for persisting backtest output.
pub trait ReportPort {
    /// Write a date × symbol matrix (P&L or actions).
    fn write_matrix(&self, matrix: &DateMatrix, path: &Path) -> Result<(), BacktestError>;

    fn write_equity(&self, curve: &[EquityPoint], path: &Path) -> Result<(), BacktestError>;
}
