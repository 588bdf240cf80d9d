//! Trading universe: symbol lists and dataset loading.
//!
//! Loading is the thin acquisition step in front of the engine. A symbol whose
//! data cannot be fetched is skipped with a warning; the rest are aligned into
//! a [`MarketDataset`], which drops symbols with gaps.

use crate::domain::dataset::{DropReason, DroppedSymbol, MarketDataset};
use crate::domain::error::BacktestError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Dow Jones Industrial Average constituents, used when no symbols are configured.
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "AXP", "BA", "CAT", "CVX", "CSCO", "DIS", "DD", "XOM", "GE", "GS", "HD", "IBM",
    "INTC", "JNJ", "JPM", "KO", "MCD", "MMM", "MRK", "MSFT", "NKE", "PFE", "PG", "TRV", "UTX",
    "UNH", "VZ", "V", "WMT",
];

pub fn default_universe() -> Vec<String> {
    DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

pub struct LoadedUniverse {
    pub dataset: MarketDataset,
    pub skipped: Vec<DroppedSymbol>,
}

/// Fetch every symbol over `[start_date, end_date]` and align the survivors.
pub fn load_dataset(
    data_port: &dyn DataPort,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<LoadedUniverse, BacktestError> {
    let mut series = Vec::with_capacity(symbols.len());
    let mut skipped = Vec::new();

    for symbol in symbols {
        match data_port.fetch_ohlcv(symbol, start_date, end_date) {
            Ok(bars) => {
                tracing::debug!(%symbol, bars = bars.len(), "fetched");
                series.push((symbol.clone(), bars));
            }
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "skipping symbol");
                skipped.push(DroppedSymbol {
                    symbol: symbol.clone(),
                    reason: DropReason::FetchFailed {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    if series.is_empty() {
        return Err(BacktestError::NoData {
            symbol: "all".to_string(),
        });
    }

    let (dataset, dropped) = MarketDataset::from_bars(series)?;
    skipped.extend(dropped);

    if !skipped.is_empty() {
        tracing::warn!(
            kept = dataset.width(),
            requested = symbols.len(),
            "universe reduced"
        );
    }

    Ok(LoadedUniverse { dataset, skipped })
}
