//! CSV report writer.

use crate::domain::error::BacktestError;
use crate::domain::matrix::DateMatrix;
use crate::domain::metrics::EquityPoint;
use crate::ports::report_port::ReportPort;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

fn write_error(path: &Path, e: csv::Error) -> BacktestError {
    BacktestError::Data {
        reason: format!("failed to write {}: {e}", path.display()),
    }
}

impl ReportPort for CsvReportAdapter {
    /// Header `date,<symbols...>`, one row per session.
    fn write_matrix(&self, matrix: &DateMatrix, path: &Path) -> Result<(), BacktestError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| write_error(path, e))?;

        let mut header = Vec::with_capacity(matrix.width() + 1);
        header.push("date");
        header.extend(matrix.symbols().iter().map(String::as_str));
        wtr.write_record(&header).map_err(|e| write_error(path, e))?;

        for (r, date) in matrix.dates().iter().enumerate() {
            let mut record = Vec::with_capacity(matrix.width() + 1);
            record.push(date.format("%Y-%m-%d").to_string());
            record.extend(matrix.row(r).iter().map(|v| v.to_string()));
            wtr.write_record(&record).map_err(|e| write_error(path, e))?;
        }

        wtr.flush()?;
        tracing::info!(path = %path.display(), rows = matrix.len(), "wrote matrix");
        Ok(())
    }

    fn write_equity(&self, curve: &[EquityPoint], path: &Path) -> Result<(), BacktestError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| write_error(path, e))?;
        wtr.write_record(["date", "daily_pnl", "equity"])
            .map_err(|e| write_error(path, e))?;
        for point in curve {
            wtr.write_record([
                point.date.format("%Y-%m-%d").to_string(),
                point.daily_pnl.to_string(),
                point.equity.to_string(),
            ])
            .map_err(|e| write_error(path, e))?;
        }
        wtr.flush()?;
        tracing::info!(path = %path.display(), rows = curve.len(), "wrote equity curve");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 1, day).unwrap()
    }

    #[test]
    fn writes_matrix_with_date_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pnl.csv");
        let m = DateMatrix::from_rows(
            vec![d(4), d(5)],
            vec!["AAPL".to_string(), "MSFT".to_string()],
            vec![vec![1.5, -0.25], vec![0.0, 2.0]],
        )
        .unwrap();

        CsvReportAdapter.write_matrix(&m, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![
            "date,AAPL,MSFT",
            "2016-01-04,1.5,-0.25",
            "2016-01-05,0,2",
        ]);
    }

    #[test]
    fn empty_matrix_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        let m = DateMatrix::zeros(vec![], vec!["A".to_string()]);

        CsvReportAdapter.write_matrix(&m, &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "date,A\n");
    }

    #[test]
    fn writes_equity_curve() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("equity.csv");
        let curve = vec![
            EquityPoint {
                date: d(4),
                daily_pnl: 2.0,
                equity: 2.0,
            },
            EquityPoint {
                date: d(5),
                daily_pnl: -0.5,
                equity: 1.5,
            },
        ];

        CsvReportAdapter.write_equity(&curve, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("date,daily_pnl,equity\n"));
        assert!(content.contains("2016-01-05,-0.5,1.5"));
    }

    #[test]
    fn unwritable_path_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("pnl.csv");
        let m = DateMatrix::zeros(vec![d(4)], vec!["A".to_string()]);
        assert!(CsvReportAdapter.write_matrix(&m, &path).is_err());
    }
}
