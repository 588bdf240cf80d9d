//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for dailybt.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    /// A signal could not find the history it needs (no prior session, empty
    /// look-back window).
    #[error("{signal}: insufficient data on {date}: {reason}")]
    DataInsufficient {
        signal: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("{signal}: regression failed for {symbol} on {date}: {reason}")]
    NumericFit {
        signal: String,
        date: NaiveDate,
        symbol: String,
        reason: String,
    },

    #[error("{signal}: returned {actual} actions on {date}, expected {expected}")]
    SignalShape {
        signal: String,
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },

    #[error("invalid horizon: start {start} is after end {end}")]
    InvalidHorizon { start: NaiveDate, end: NaiveDate },

    #[error("no trading dates between {start} and {end}")]
    NoTradingDates { start: NaiveDate, end: NaiveDate },

    #[error("invalid dataset: {reason}")]
    Dataset { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn data_insufficient(signal: &str, date: NaiveDate, reason: impl Into<String>) -> Self {
        BacktestError::DataInsufficient {
            signal: signal.to_string(),
            date,
            reason: reason.into(),
        }
    }

    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        BacktestError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. }
            | BacktestError::InvalidHorizon { .. }
            | BacktestError::NoTradingDates { .. } => 2,
            BacktestError::Data { .. }
            | BacktestError::NoData { .. }
            | BacktestError::Dataset { .. } => 3,
            BacktestError::DataInsufficient { .. } => 5,
            BacktestError::NumericFit { .. } | BacktestError::SignalShape { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
