//! Configuration validation.
//!
//! Checks every recognised key before a run so that a malformed value is
//! reported up front instead of silently falling back to a default.

use crate::domain::backtest::MAX_DECIMALS;
use crate::domain::error::BacktestError;
use crate::domain::signal::SIGNAL_NAMES;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_dates(config)?;
    validate_spread(config)?;
    validate_decimals(config)?;
    validate_signal(config, "open_signal")?;
    validate_signal(config, "close_signal")?;
    validate_flag(config, "backtest", "strict")?;
    validate_flag(config, "backtest", "remove_biggest_jump")?;
    validate_symbols(config)?;
    validate_history_days(config)?;
    validate_mean_reversion(config)?;
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date > end_date {
        return Err(BacktestError::config_invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, BacktestError> {
    match config.get_date("backtest", field) {
        None => Err(BacktestError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(parsed) => parsed.map_err(|_| {
            BacktestError::config_invalid(
                "backtest",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

fn parse_number<T: std::str::FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| BacktestError::config_invalid(section, key, format!("not a number: {s}"))),
    }
}

fn validate_spread(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(spread) = parse_number::<f64>(config, "backtest", "spread")? {
        if !spread.is_finite() || spread < 0.0 {
            return Err(BacktestError::config_invalid(
                "backtest",
                "spread",
                "spread must be a non-negative number",
            ));
        }
    }
    Ok(())
}

fn validate_decimals(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(decimals) = parse_number::<i64>(config, "backtest", "decimals")? {
        if !(0..=i64::from(MAX_DECIMALS)).contains(&decimals) {
            return Err(BacktestError::config_invalid(
                "backtest",
                "decimals",
                format!("decimals must be between 0 and {MAX_DECIMALS}"),
            ));
        }
    }
    Ok(())
}

fn validate_signal(config: &dyn ConfigPort, key: &str) -> Result<(), BacktestError> {
    match config.get_string("backtest", key) {
        Some(name) if !SIGNAL_NAMES.contains(&name.trim().to_lowercase().as_str()) => {
            Err(BacktestError::config_invalid(
                "backtest",
                key,
                format!("unknown signal '{}', expected one of {}", name.trim(), SIGNAL_NAMES.join(", ")),
            ))
        }
        _ => Ok(()),
    }
}

fn validate_flag(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BacktestError> {
    match config.get_string(section, key) {
        Some(v)
            if !matches!(
                v.trim().to_lowercase().as_str(),
                "true" | "false" | "yes" | "no" | "1" | "0" | "on" | "off"
            ) =>
        {
            Err(BacktestError::config_invalid(section, key, "expected a boolean"))
        }
        _ => Ok(()),
    }
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(list) = config.get_string("data", "symbols") {
        parse_symbols(&list).map_err(|e| BacktestError::config_invalid("data", "symbols", e.to_string()))?;
    }
    Ok(())
}

fn validate_history_days(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(days) = parse_number::<i64>(config, "data", "history_days")? {
        if days < 0 {
            return Err(BacktestError::config_invalid(
                "data",
                "history_days",
                "history_days must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_mean_reversion(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(months) = parse_number::<i64>(config, "mean_reversion", "lookback_months")? {
        if !(1..=120).contains(&months) {
            return Err(BacktestError::config_invalid(
                "mean_reversion",
                "lookback_months",
                "lookback_months must be between 1 and 120",
            ));
        }
    }
    match config.get_string("mean_reversion", "degenerate_fit") {
        Some(v) if !matches!(v.trim().to_lowercase().as_str(), "fail" | "neutral") => {
            Err(BacktestError::config_invalid(
                "mean_reversion",
                "degenerate_fit",
                "expected 'fail' or 'neutral'",
            ))
        }
        _ => Ok(()),
    }
}
