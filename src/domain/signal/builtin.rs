//! Small deterministic signals.

use super::{Signal, net_positions, sign};
use crate::domain::dataset::MarketView;
use crate::domain::error::BacktestError;
use crate::domain::matrix::MatrixView;
use chrono::NaiveDate;

/// One unit of every symbol on the first simulated session, nothing after.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAtStart;

/// Never trades.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hold;

/// Liquidates every open position.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseAll;

/// Follows the direction of the previous session's body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimicOpen;

/// Undoes the same session's open actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseDailyPositions;

/// Bets on intraday volatility calming down or picking up:
/// sign(vol[t-2] - vol[t-1]) with vol = (close - open)².
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilitySignal;

/// Indices of the `n` latest sessions strictly before `t`, oldest first.
fn prior_sessions(
    signal: &str,
    t: NaiveDate,
    market: &MarketView<'_>,
    n: usize,
) -> Result<std::ops::Range<usize>, BacktestError> {
    let before = market.dates().partition_point(|d| *d < t);
    if before < n {
        let reason = match (n, before) {
            (1, _) => "no prior session".to_string(),
            _ => format!("need {n} prior sessions, have {before}"),
        };
        return Err(BacktestError::data_insufficient(signal, t, reason));
    }
    Ok(before - n..before)
}

impl Signal for BuyAtStart {
    fn name(&self) -> &str {
        "buy_at_start"
    }

    fn actions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
        open_actions: &MatrixView<'_>,
        _close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        let first = open_actions.dates().first() == Some(&t);
        Ok(vec![if first { 1.0 } else { 0.0 }; market.width()])
    }
}

impl Signal for Hold {
    fn name(&self) -> &str {
        "hold"
    }

    fn actions(
        &self,
        _t: NaiveDate,
        market: &MarketView<'_>,
        _open_actions: &MatrixView<'_>,
        _close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        Ok(vec![0.0; market.width()])
    }
}

impl Signal for CloseAll {
    fn name(&self) -> &str {
        "close_all"
    }

    fn actions(
        &self,
        _t: NaiveDate,
        _market: &MarketView<'_>,
        open_actions: &MatrixView<'_>,
        close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        Ok(net_positions(open_actions, close_actions)
            .into_iter()
            .map(|p| 0.0 - p)
            .collect())
    }
}

impl Signal for MimicOpen {
    fn name(&self) -> &str {
        "mimic_open"
    }

    fn actions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
        _open_actions: &MatrixView<'_>,
        _close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        let prev = prior_sessions(self.name(), t, market, 1)?.start;
        let open = market.open().row(prev);
        let close = market.close().row(prev);
        Ok(close.iter().zip(open).map(|(c, o)| sign(c - o)).collect())
    }
}

impl Signal for CloseDailyPositions {
    fn name(&self) -> &str {
        "close_daily_positions"
    }

    fn actions(
        &self,
        t: NaiveDate,
        _market: &MarketView<'_>,
        open_actions: &MatrixView<'_>,
        _close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        let row = open_actions.position(t).ok_or_else(|| {
            BacktestError::data_insufficient(self.name(), t, "no open actions recorded for session")
        })?;
        Ok(open_actions.row(row).iter().map(|a| 0.0 - a).collect())
    }
}

impl Signal for VolatilitySignal {
    fn name(&self) -> &str {
        "volatility"
    }

    fn actions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
        _open_actions: &MatrixView<'_>,
        _close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        let sessions = prior_sessions(self.name(), t, market, 2)?;
        let vol = |row: usize, col: usize| {
            let body = market.close().get(row, col) - market.open().get(row, col);
            body * body
        };
        let (older, newer) = (sessions.start, sessions.start + 1);
        Ok((0..market.width())
            .map(|c| sign(vol(older, c) - vol(newer, c)))
            .collect())
    }
}
