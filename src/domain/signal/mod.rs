//! Pluggable trading signals.
//!
//! A signal maps `(t, market as of t, open actions, close actions)` to one
//! action per symbol. The engine calls an open signal and a close signal once
//! per session; both see only rows dated on or before `t`.

pub mod builtin;
pub mod mean_reversion;
pub mod regression;

use crate::domain::dataset::MarketView;
use crate::domain::error::BacktestError;
use crate::domain::matrix::MatrixView;
use chrono::NaiveDate;

pub use builtin::{
    BuyAtStart, CloseAll, CloseDailyPositions, Hold, MimicOpen, VolatilitySignal,
};
pub use mean_reversion::{DegenerateFit, MeanReversionSignal};

pub trait Signal {
    fn name(&self) -> &str;

    /// Actions for session `t`, in the market's symbol order.
    fn actions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
        open_actions: &MatrixView<'_>,
        close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError>;
}

impl<F> Signal for F
where
    F: Fn(NaiveDate, &MarketView<'_>, &MatrixView<'_>, &MatrixView<'_>) -> Result<Vec<f64>, BacktestError>,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn actions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
        open_actions: &MatrixView<'_>,
        close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        self(t, market, open_actions, close_actions)
    }
}

/// A closure signal with a name that shows up in errors and logs.
pub struct Named<F> {
    name: String,
    f: F,
}

pub fn named<F>(name: impl Into<String>, f: F) -> Named<F>
where
    F: Fn(NaiveDate, &MarketView<'_>, &MatrixView<'_>, &MatrixView<'_>) -> Result<Vec<f64>, BacktestError>,
{
    Named {
        name: name.into(),
        f,
    }
}

impl<F> Signal for Named<F>
where
    F: Fn(NaiveDate, &MarketView<'_>, &MatrixView<'_>, &MatrixView<'_>) -> Result<Vec<f64>, BacktestError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
        open_actions: &MatrixView<'_>,
        close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        (self.f)(t, market, open_actions, close_actions)
    }
}

pub const SIGNAL_NAMES: &[&str] = &[
    "buy_at_start",
    "hold",
    "close_all",
    "mimic_open",
    "close_daily_positions",
    "volatility",
    "mean_reversion",
];

/// Look up a built-in signal by its config name. `mean_reversion` uses
/// default parameters; build [`MeanReversionSignal`] directly to tune it.
pub fn signal_by_name(name: &str) -> Option<Box<dyn Signal + Send + Sync>> {
    let signal: Box<dyn Signal + Send + Sync> = match name.trim().to_lowercase().as_str() {
        "buy_at_start" => Box::new(BuyAtStart),
        "hold" => Box::new(Hold),
        "close_all" => Box::new(CloseAll),
        "mimic_open" => Box::new(MimicOpen),
        "close_daily_positions" => Box::new(CloseDailyPositions),
        "volatility" => Box::new(VolatilitySignal),
        "mean_reversion" => Box::new(MeanReversionSignal::default()),
        _ => return None,
    };
    Some(signal)
}

/// -1, 0 or +1. Unlike `f64::signum`, zero maps to zero.
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Net position per symbol: cumulative open plus close actions over every
/// row visible in the views.
pub fn net_positions(open_actions: &MatrixView<'_>, close_actions: &MatrixView<'_>) -> Vec<f64> {
    open_actions
        .column_sums()
        .into_iter()
        .zip(close_actions.column_sums())
        .map(|(o, c)| o + c)
        .collect()
}
