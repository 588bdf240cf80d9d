//! Backtest engine and session loop.
//!
//! Sessions are simulated in date order. For each session `t` the open signal
//! fills `open_actions[t]`, then the close signal fills `close_actions[t]`; on
//! the last session the close row is always the full liquidation from
//! [`CloseAll`], whatever the configured close signal would have done. Signals
//! receive views that end at `t`, so no future price or action is reachable.

use crate::domain::dataset::MarketDataset;
use crate::domain::error::BacktestError;
use crate::domain::matrix::DateMatrix;
use crate::domain::signal::{CloseAll, Signal};
use chrono::NaiveDate;

/// Largest `decimals` accepted; beyond this f64 cannot hold the rounding.
pub const MAX_DECIMALS: u32 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Cost per unit traded, at open or close.
    pub spread: f64,
    /// Round the P&L matrix to this many decimals.
    pub decimals: Option<u32>,
    /// Fail with [`BacktestError::NoTradingDates`] instead of returning
    /// empty matrices when the horizon holds no session.
    pub strict: bool,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            spread: 0.0,
            decimals: None,
            strict: false,
        }
    }

    fn validate(&self) -> Result<(), BacktestError> {
        if self.start_date > self.end_date {
            return Err(BacktestError::InvalidHorizon {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(BacktestError::config_invalid(
                "backtest",
                "spread",
                format!("spread must be a non-negative number, got {}", self.spread),
            ));
        }
        if let Some(decimals) = self.decimals.filter(|d| *d > MAX_DECIMALS) {
            return Err(BacktestError::config_invalid(
                "backtest",
                "decimals",
                format!("decimals must be between 0 and {MAX_DECIMALS}, got {decimals}"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub pnl: DateMatrix,
    pub open_actions: DateMatrix,
    pub close_actions: DateMatrix,
}

impl BacktestResult {
    pub fn dates(&self) -> &[NaiveDate] {
        self.pnl.dates()
    }

    pub fn total_pnl(&self) -> f64 {
        self.pnl.total()
    }

    /// Net position per symbol after the last simulated session. Always zero
    /// for a completed run.
    pub fn final_positions(&self) -> Vec<f64> {
        self.open_actions
            .column_sums()
            .into_iter()
            .zip(self.close_actions.column_sums())
            .map(|(o, c)| o + c)
            .collect()
    }
}

/// pnl[t,s] = -open_action·open - close_action·close - (|open_action| + |close_action|)·spread
pub fn compute_pnl(
    dataset: &MarketDataset,
    open_actions: &DateMatrix,
    close_actions: &DateMatrix,
    spread: f64,
) -> DateMatrix {
    let mut pnl = DateMatrix::zeros(open_actions.dates().to_vec(), open_actions.symbols().to_vec());
    for (r, date) in open_actions.dates().iter().enumerate() {
        let Some(row) = dataset.position(*date) else {
            continue;
        };
        let open = dataset.open().row(row);
        let close = dataset.close().row(row);
        for c in 0..pnl.width() {
            let oa = open_actions.get(r, c);
            let ca = close_actions.get(r, c);
            let cost = (oa.abs() + ca.abs()) * spread;
            pnl.set(r, c, 0.0 - oa * open[c] - ca * close[c] - cost);
        }
    }
    pnl
}

pub fn run_backtest(
    dataset: &MarketDataset,
    open_signal: &dyn Signal,
    close_signal: &dyn Signal,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;

    let dates = dataset.trading_dates(config.start_date, config.end_date);
    if dates.is_empty() && config.strict {
        return Err(BacktestError::NoTradingDates {
            start: config.start_date,
            end: config.end_date,
        });
    }

    tracing::info!(
        sessions = dates.len(),
        symbols = dataset.width(),
        open_signal = open_signal.name(),
        close_signal = close_signal.name(),
        "starting backtest"
    );

    let symbols = dataset.symbols().to_vec();
    let mut open_actions = DateMatrix::zeros(dates.clone(), symbols.clone());
    let mut close_actions = DateMatrix::zeros(dates.clone(), symbols);
    let last = dates.len().saturating_sub(1);

    for (i, &t) in dates.iter().enumerate() {
        let market = dataset.as_of(t);

        let row = {
            let oa = open_actions.view().through(i);
            let ca = close_actions.view().through(i);
            checked(open_signal, t, open_signal.actions(t, &market, &oa, &ca)?, dataset.width())?
        };
        open_actions.row_mut(i).copy_from_slice(&row);

        let closer: &dyn Signal = if i == last { &CloseAll } else { close_signal };
        let row = {
            let oa = open_actions.view().through(i);
            let ca = close_actions.view().through(i);
            checked(closer, t, closer.actions(t, &market, &oa, &ca)?, dataset.width())?
        };
        close_actions.row_mut(i).copy_from_slice(&row);

        tracing::debug!(date = %t, open = ?open_actions.row(i), close = ?close_actions.row(i), "session done");
    }

    let pnl = compute_pnl(dataset, &open_actions, &close_actions, config.spread);
    let pnl = match config.decimals {
        Some(d) => pnl.rounded(d),
        None => pnl,
    };

    tracing::info!(total_pnl = pnl.total(), "backtest finished");

    Ok(BacktestResult {
        pnl,
        open_actions,
        close_actions,
    })
}

fn checked(
    signal: &dyn Signal,
    t: NaiveDate,
    row: Vec<f64>,
    width: usize,
) -> Result<Vec<f64>, BacktestError> {
    if row.len() != width {
        return Err(BacktestError::SignalShape {
            signal: signal.name().to_string(),
            date: t,
            expected: width,
            actual: row.len(),
        });
    }
    Ok(row)
}
