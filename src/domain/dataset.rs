//! Date-aligned multi-symbol OHLCV dataset.
//!
//! All five matrices share one date index (strictly increasing) and one symbol
//! order. When assembled from per-symbol bars, a symbol missing any session of
//! the merged calendar is dropped from the universe rather than padded.

use crate::domain::error::BacktestError;
use crate::domain::matrix::{DateMatrix, MatrixView};
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataset {
    open: DateMatrix,
    high: DateMatrix,
    low: DateMatrix,
    close: DateMatrix,
    volume: DateMatrix,
}

/// Why a symbol was left out of an assembled dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    FetchFailed { reason: String },
    NoBars,
    MissingSessions { missing: usize },
    DuplicateDate { date: NaiveDate },
    UnusableBar { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedSymbol {
    pub symbol: String,
    pub reason: DropReason,
}

/// The largest absolute intraday log move in a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Jump {
    pub date: NaiveDate,
    pub symbol: String,
    pub log_jump: f64,
}

impl MarketDataset {
    pub fn new(
        open: DateMatrix,
        high: DateMatrix,
        low: DateMatrix,
        close: DateMatrix,
        volume: DateMatrix,
    ) -> Result<Self, BacktestError> {
        for (name, m) in [("high", &high), ("low", &low), ("close", &close), ("volume", &volume)] {
            if m.dates() != open.dates() {
                return Err(BacktestError::Dataset {
                    reason: format!("{name} date index differs from open"),
                });
            }
            if m.symbols() != open.symbols() {
                return Err(BacktestError::Dataset {
                    reason: format!("{name} symbols differ from open"),
                });
            }
        }
        if open.dates().windows(2).any(|w| w[0] >= w[1]) {
            return Err(BacktestError::Dataset {
                reason: "dates must be strictly increasing".into(),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = open.symbols().iter().find(|s| !seen.insert(s.as_str())) {
            return Err(BacktestError::Dataset {
                reason: format!("duplicate symbol {dup}"),
            });
        }
        Ok(Self {
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Merge per-symbol bar series onto the union of their dates.
    ///
    /// Symbols are kept in input order. A symbol with no bars, a repeated date,
    /// an unusable bar, or a gap in the merged calendar is dropped and reported.
    pub fn from_bars(
        series: Vec<(String, Vec<OhlcvBar>)>,
    ) -> Result<(Self, Vec<DroppedSymbol>), BacktestError> {
        let calendar: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, bars)| bars.iter().map(|b| b.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut kept: Vec<(String, HashMap<NaiveDate, OhlcvBar>)> = Vec::new();
        let mut dropped = Vec::new();

        for (symbol, bars) in series {
            match index_bars(&calendar, bars) {
                Ok(by_date) => kept.push((symbol, by_date)),
                Err(reason) => {
                    tracing::warn!(%symbol, ?reason, "dropping symbol from universe");
                    dropped.push(DroppedSymbol { symbol, reason });
                }
            }
        }

        if kept.is_empty() {
            return Err(BacktestError::Dataset {
                reason: "no symbol has a complete price history".into(),
            });
        }

        let symbols: Vec<String> = kept.iter().map(|(s, _)| s.clone()).collect();
        let field = |f: fn(&OhlcvBar) -> f64| -> DateMatrix {
            let mut m = DateMatrix::zeros(calendar.clone(), symbols.clone());
            for (r, date) in calendar.iter().enumerate() {
                for (c, (_, by_date)) in kept.iter().enumerate() {
                    m.set(r, c, f(&by_date[date]));
                }
            }
            m
        };

        let dataset = Self::new(
            field(|b| b.open),
            field(|b| b.high),
            field(|b| b.low),
            field(|b| b.close),
            field(|b| b.volume),
        )?;
        Ok((dataset, dropped))
    }

    pub fn symbols(&self) -> &[String] {
        self.open.symbols()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.open.dates()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn width(&self) -> usize {
        self.open.width()
    }

    pub fn open(&self) -> &DateMatrix {
        &self.open
    }

    pub fn high(&self) -> &DateMatrix {
        &self.high
    }

    pub fn low(&self) -> &DateMatrix {
        &self.low
    }

    pub fn close(&self) -> &DateMatrix {
        &self.close
    }

    pub fn volume(&self) -> &DateMatrix {
        &self.volume
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.open.position(date)
    }

    /// Trading sessions in `[start, end]`, ascending.
    pub fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        self.dates()
            .iter()
            .copied()
            .filter(|d| *d >= start && *d <= end)
            .collect()
    }

    /// Everything known as of the session `t`: rows dated on or before `t`.
    pub fn as_of(&self, t: NaiveDate) -> MarketView<'_> {
        let rows = self.dates().partition_point(|d| *d <= t);
        MarketView {
            open: self.open.view().take(rows),
            high: self.high.view().take(rows),
            low: self.low.view().take(rows),
            close: self.close.view().take(rows),
            volume: self.volume.view().take(rows),
        }
    }

    /// Full-history view.
    pub fn view(&self) -> MarketView<'_> {
        MarketView {
            open: self.open.view(),
            high: self.high.view(),
            low: self.low.view(),
            close: self.close.view(),
            volume: self.volume.view(),
        }
    }

    /// The (date, symbol) with the largest |ln(close / open)|. Ties keep the
    /// earliest date, then the first symbol.
    pub fn find_biggest_jump(&self) -> Option<Jump> {
        let mut best: Option<(usize, usize, f64)> = None;
        for r in 0..self.len() {
            for c in 0..self.width() {
                let jump = (self.close.get(r, c) / self.open.get(r, c)).ln();
                if !jump.is_finite() {
                    continue;
                }
                if best.is_none_or(|(_, _, b)| jump.abs() > b.abs()) {
                    best = Some((r, c, jump));
                }
            }
        }
        best.map(|(r, c, log_jump)| Jump {
            date: self.dates()[r],
            symbol: self.symbols()[c].clone(),
            log_jump,
        })
    }

    /// Neutralize the biggest intraday jump by overwriting its close with the
    /// session's open. Returns the corrected point.
    pub fn remove_biggest_jump(&mut self) -> Option<Jump> {
        let jump = self.find_biggest_jump()?;
        let r = self.position(jump.date)?;
        let c = self.open.symbol_index(&jump.symbol)?;
        let open = self.open.get(r, c);
        self.close.set(r, c, open);
        tracing::info!(date = %jump.date, symbol = %jump.symbol, log_jump = jump.log_jump, "removed biggest jump");
        Some(jump)
    }

    /// Overwrite close with open at one (date, symbol).
    pub fn correct_outlier(&mut self, date: NaiveDate, symbol: &str) -> Result<(), BacktestError> {
        let r = self.position(date).ok_or_else(|| BacktestError::Dataset {
            reason: format!("no session on {date}"),
        })?;
        let c = self
            .open
            .symbol_index(symbol)
            .ok_or_else(|| BacktestError::Dataset {
                reason: format!("unknown symbol {symbol}"),
            })?;
        let open = self.open.get(r, c);
        self.close.set(r, c, open);
        Ok(())
    }
}

fn index_bars(
    calendar: &[NaiveDate],
    bars: Vec<OhlcvBar>,
) -> Result<HashMap<NaiveDate, OhlcvBar>, DropReason> {
    if bars.is_empty() {
        return Err(DropReason::NoBars);
    }
    let mut by_date = HashMap::with_capacity(bars.len());
    for bar in bars {
        if !bar.is_usable() {
            return Err(DropReason::UnusableBar { date: bar.date });
        }
        let date = bar.date;
        if by_date.insert(date, bar).is_some() {
            return Err(DropReason::DuplicateDate { date });
        }
    }
    let missing = calendar.iter().filter(|d| !by_date.contains_key(d)).count();
    if missing > 0 {
        return Err(DropReason::MissingSessions { missing });
    }
    Ok(by_date)
}

/// Causal slice of a [`MarketDataset`]: only sessions up to some date.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    open: MatrixView<'a>,
    high: MatrixView<'a>,
    low: MatrixView<'a>,
    close: MatrixView<'a>,
    volume: MatrixView<'a>,
}

impl<'a> MarketView<'a> {
    pub fn symbols(&self) -> &'a [String] {
        self.open.symbols()
    }

    pub fn dates(&self) -> &'a [NaiveDate] {
        self.open.dates()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn width(&self) -> usize {
        self.open.width()
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.open.position(date)
    }

    pub fn open(&self) -> MatrixView<'a> {
        self.open
    }

    pub fn high(&self) -> MatrixView<'a> {
        self.high
    }

    pub fn low(&self) -> MatrixView<'a> {
        self.low
    }

    pub fn close(&self) -> MatrixView<'a> {
        self.close
    }

    pub fn volume(&self) -> MatrixView<'a> {
        self.volume
    }
}
