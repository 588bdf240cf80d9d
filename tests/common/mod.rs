#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use dailybt::domain::dataset::MarketDataset;
use dailybt::domain::error::BacktestError;
use dailybt::domain::matrix::DateMatrix;
use dailybt::domain::metrics::EquityPoint;
pub use dailybt::domain::ohlcv::OhlcvBar;
use dailybt::ports::data_port::DataPort;
use dailybt::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, BacktestError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacktestError::Data {
                reason: reason.clone(),
            });
        }
        let bars: Vec<OhlcvBar> = self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(BacktestError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Records every write instead of touching the filesystem.
#[derive(Default)]
pub struct RecordingReportPort {
    pub matrices: RefCell<Vec<(PathBuf, DateMatrix)>>,
    pub equity: RefCell<Vec<(PathBuf, Vec<EquityPoint>)>>,
}

impl ReportPort for RecordingReportPort {
    fn write_matrix(&self, matrix: &DateMatrix, path: &Path) -> Result<(), BacktestError> {
        self.matrices
            .borrow_mut()
            .push((path.to_path_buf(), matrix.clone()));
        Ok(())
    }

    fn write_equity(&self, curve: &[EquityPoint], path: &Path) -> Result<(), BacktestError> {
        self.equity
            .borrow_mut()
            .push((path.to_path_buf(), curve.to_vec()));
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive weekdays starting on or after `from`.
pub fn weekdays(from: NaiveDate, n: usize) -> Vec<NaiveDate> {
    from.iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(n)
        .collect()
}

pub fn make_bar(symbol: &str, date: NaiveDate, open: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        date,
        open,
        high: open.max(close) + 0.5,
        low: open.min(close) - 0.5,
        close,
        volume: 1_000_000.0,
    }
}

/// Deterministic noisy price path: a small linear congruential generator
/// drives log-returns of up to ±2% per half session.
pub fn random_walk(symbol: &str, dates: &[NaiveDate], start: f64, seed: u64) -> Vec<OhlcvBar> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) * 0.04 - 0.02
    };

    let mut price = start;
    dates
        .iter()
        .map(|&d| {
            let open = price * next().exp();
            let close = open * next().exp();
            price = close;
            make_bar(symbol, d, open, close)
        })
        .collect()
}

pub fn dataset_from(series: Vec<(&str, Vec<OhlcvBar>)>) -> MarketDataset {
    let series = series
        .into_iter()
        .map(|(s, bars)| (s.to_string(), bars))
        .collect();
    MarketDataset::from_bars(series).unwrap().0
}

/// Four noisy symbols over `n` weekdays from 2016-01-04.
pub fn sample_dataset(n: usize) -> MarketDataset {
    let dates = weekdays(date(2016, 1, 4), n);
    dataset_from(vec![
        ("AAPL", random_walk("AAPL", &dates, 100.0, 1)),
        ("MSFT", random_walk("MSFT", &dates, 55.0, 2)),
        ("IBM", random_walk("IBM", &dates, 130.0, 3)),
        ("XOM", random_walk("XOM", &dates, 80.0, 4)),
    ])
}
