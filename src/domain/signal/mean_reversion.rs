//! Cross-sectional mean-reversion open signal.
//!
//! For every symbol, regress the daily log-open return on the previous log
//! open over a trailing window (a discretized Ornstein-Uhlenbeck fit):
//!
//!   dz[i] ≈ a + b·z[i-1]
//!
//! and predict the next move from the last point of the window, a + b·z_last.
//! Symbols are then ranked across the universe: the bottom tercile is shorted
//! when its prediction is non-positive, the top tercile bought when its
//! prediction is non-negative, everything else stays flat.

use super::Signal;
use super::regression::{FitError, ols, percentile};
use crate::domain::dataset::MarketView;
use crate::domain::error::BacktestError;
use crate::domain::matrix::MatrixView;
use chrono::{Months, NaiveDate};
use rayon::prelude::*;
use std::ops::Range;

pub const LOWER_PERCENTILE: f64 = 33.0;
pub const UPPER_PERCENTILE: f64 = 67.0;

/// What to do with a symbol whose regression cannot be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegenerateFit {
    /// Abort the session with [`BacktestError::NumericFit`].
    #[default]
    Fail,
    /// Force the symbol flat and leave it out of the percentile ranking.
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeanReversionSignal {
    pub lookback_months: u32,
    pub degenerate: DegenerateFit,
}

impl Default for MeanReversionSignal {
    fn default() -> Self {
        Self {
            lookback_months: 1,
            degenerate: DegenerateFit::Fail,
        }
    }
}

impl MeanReversionSignal {
    pub fn new(lookback_months: u32, degenerate: DegenerateFit) -> Self {
        Self {
            lookback_months,
            degenerate,
        }
    }

    /// Rows of the sessions in `[t - lookback, t)`.
    pub fn window(&self, t: NaiveDate, market: &MarketView<'_>) -> Result<Range<usize>, BacktestError> {
        let start = t
            .checked_sub_months(Months::new(self.lookback_months))
            .ok_or_else(|| BacktestError::data_insufficient(self.name(), t, "look-back start out of range"))?;
        let dates = market.dates();
        let lo = dates.partition_point(|d| *d < start);
        let hi = dates.partition_point(|d| *d < t);
        if lo >= hi {
            return Err(BacktestError::data_insufficient(
                self.name(),
                t,
                format!("no sessions between {start} and {t}"),
            ));
        }
        Ok(lo..hi)
    }

    /// One-step-ahead predicted log return per symbol. `None` marks a symbol
    /// forced neutral under [`DegenerateFit::Neutral`].
    pub fn predictions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
    ) -> Result<Vec<Option<f64>>, BacktestError> {
        let window = self.window(t, market)?;
        let open = market.open();

        let fits: Vec<Result<f64, FitError>> = (0..market.width())
            .into_par_iter()
            .map(|col| predict_symbol(&open, col, window.clone()))
            .collect();

        fits.into_iter()
            .zip(market.symbols())
            .map(|(fit, symbol)| match (fit, self.degenerate) {
                (Ok(pred), _) => Ok(Some(pred)),
                (Err(e), DegenerateFit::Neutral) => {
                    tracing::debug!(%symbol, date = %t, error = %e, "forcing symbol neutral");
                    Ok(None)
                }
                (Err(e), DegenerateFit::Fail) => Err(BacktestError::NumericFit {
                    signal: self.name().to_string(),
                    date: t,
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                }),
            })
            .collect()
    }
}

fn predict_symbol(open: &MatrixView<'_>, col: usize, window: Range<usize>) -> Result<f64, FitError> {
    let z: Vec<f64> = open
        .column(col)
        .skip(window.start)
        .take(window.len())
        .map(f64::ln)
        .collect();
    let n = z.len();
    if n < 2 {
        return Err(FitError::TooFewPoints(n));
    }
    let dz: Vec<f64> = z.windows(2).map(|w| w[1] - w[0]).collect();
    let fit = ols(&z[..n - 1], &dz)?;
    let pred = fit.predict(z[n - 1]);
    if pred.is_finite() {
        Ok(pred)
    } else {
        Err(FitError::NonFinite)
    }
}

/// Turn predictions into -1 / 0 / +1 using the 33rd and 67th cross-sectional
/// percentiles, clamped so a trade never contradicts its own prediction.
pub fn classify(predictions: &[Option<f64>]) -> Vec<f64> {
    let ranked: Vec<f64> = predictions.iter().flatten().copied().collect();
    let (Some(lower), Some(upper)) = (
        percentile(&ranked, LOWER_PERCENTILE),
        percentile(&ranked, UPPER_PERCENTILE),
    ) else {
        return vec![0.0; predictions.len()];
    };
    let short_below = lower.min(0.0);
    let long_above = upper.max(0.0);

    predictions
        .iter()
        .map(|pred| match pred {
            Some(p) if *p <= short_below => -1.0,
            Some(p) if *p >= long_above => 1.0,
            _ => 0.0,
        })
        .collect()
}

impl Signal for MeanReversionSignal {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn actions(
        &self,
        t: NaiveDate,
        market: &MarketView<'_>,
        _open_actions: &MatrixView<'_>,
        _close_actions: &MatrixView<'_>,
    ) -> Result<Vec<f64>, BacktestError> {
        let predictions = self.predictions(t, market)?;
        Ok(classify(&predictions))
    }
}
