//! P&L statistics for a completed backtest.

use crate::domain::backtest::BacktestResult;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub daily_pnl: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPnl {
    pub symbol: String,
    pub pnl: f64,
    pub units_traded: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PnlSummary {
    pub total_pnl: f64,
    pub sessions: usize,
    pub active_sessions: usize,
    pub units_traded: f64,
    pub winning_sessions: usize,
    pub losing_sessions: usize,
    pub best_session: f64,
    pub worst_session: f64,
    /// Largest fall of cumulative P&L from its running peak (peak starts at 0).
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub equity_curve: Vec<EquityPoint>,
    pub per_symbol: Vec<SymbolPnl>,
}

impl PnlSummary {
    pub fn compute(result: &BacktestResult) -> Self {
        let daily = result.pnl.row_sums();
        let mut equity = 0.0;
        let equity_curve: Vec<EquityPoint> = result
            .dates()
            .iter()
            .zip(&daily)
            .map(|(&date, &daily_pnl)| {
                equity += daily_pnl;
                EquityPoint {
                    date,
                    daily_pnl,
                    equity,
                }
            })
            .collect();

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&equity_curve);

        let units = |r: usize, c: usize| {
            result.open_actions.get(r, c).abs() + result.close_actions.get(r, c).abs()
        };
        let width = result.pnl.width();
        let active_sessions = (0..result.pnl.len())
            .filter(|&r| (0..width).any(|c| units(r, c) > 0.0))
            .count();

        let pnl_by_symbol = result.pnl.column_sums();
        let per_symbol: Vec<SymbolPnl> = result
            .pnl
            .symbols()
            .iter()
            .enumerate()
            .map(|(c, symbol)| SymbolPnl {
                symbol: symbol.clone(),
                pnl: pnl_by_symbol[c],
                units_traded: (0..result.pnl.len()).map(|r| units(r, c)).sum(),
            })
            .collect();

        PnlSummary {
            total_pnl: daily.iter().sum(),
            sessions: daily.len(),
            active_sessions,
            units_traded: per_symbol.iter().map(|s| s.units_traded).sum(),
            winning_sessions: daily.iter().filter(|p| **p > 0.0).count(),
            losing_sessions: daily.iter().filter(|p| **p < 0.0).count(),
            best_session: daily.iter().copied().reduce(f64::max).unwrap_or(0.0),
            worst_session: daily.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_drawdown,
            max_drawdown_duration,
            equity_curve,
            per_symbol,
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else {
            max_dd = max_dd.max(peak - point.equity);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}
