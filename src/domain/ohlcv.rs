//! Daily OHLCV bar as delivered by a data port.

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// ln(close / open)
    pub fn intraday_log_return(&self) -> f64 {
        (self.close / self.open).ln()
    }

    /// Prices are finite and strictly positive, volume finite and non-negative.
    /// Log-price signals are undefined otherwise.
    pub fn is_usable(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}
