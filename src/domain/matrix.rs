//! Date × symbol matrices.
//!
//! [`DateMatrix`] owns a row-major grid of `f64` indexed by trading date (rows,
//! strictly increasing) and symbol (columns, fixed order). [`MatrixView`] is a
//! borrowed window over the first `n` rows; the backtest engine hands signals
//! views that end at the session being computed, so rows after it are not
//! addressable.

use super::error::BacktestError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct DateMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    values: Vec<f64>,
}

impl DateMatrix {
    pub fn zeros(dates: Vec<NaiveDate>, symbols: Vec<String>) -> Self {
        let values = vec![0.0; dates.len() * symbols.len()];
        Self {
            dates,
            symbols,
            values,
        }
    }

    /// Build from one row per date. Every row must have one value per symbol.
    pub fn from_rows(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, BacktestError> {
        if rows.len() != dates.len() {
            return Err(BacktestError::Dataset {
                reason: format!("{} rows for {} dates", rows.len(), dates.len()),
            });
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != symbols.len()) {
            return Err(BacktestError::Dataset {
                reason: format!(
                    "row for {} has {} values, expected {}",
                    dates[i],
                    row.len(),
                    symbols.len()
                ),
            });
        }
        let values = rows.into_iter().flatten().collect();
        Ok(Self {
            dates,
            symbols,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn width(&self) -> usize {
        self.symbols.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width() + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let width = self.width();
        self.values[row * width + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.width();
        &self.values[row * width..(row + 1) * width]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let width = self.width();
        &mut self.values[row * width..(row + 1) * width]
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn view(&self) -> MatrixView<'_> {
        MatrixView {
            dates: &self.dates,
            symbols: &self.symbols,
            values: &self.values,
        }
    }

    /// Sum of every cell.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Per-date sums across symbols.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.len()).map(|r| self.row(r).iter().sum()).collect()
    }

    /// Per-symbol sums across dates.
    pub fn column_sums(&self) -> Vec<f64> {
        self.view().column_sums()
    }

    /// Round every cell to `decimals` places, half away from zero. A cell
    /// whose scaled value overflows f64 is left as it is.
    pub fn rounded(&self, decimals: u32) -> Self {
        let factor = i32::try_from(decimals).map_or(f64::INFINITY, |d| 10f64.powi(d));
        let values = self
            .values
            .iter()
            .map(|&v| {
                let scaled = v * factor;
                if scaled.is_finite() {
                    scaled.round() / factor
                } else {
                    v
                }
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            symbols: self.symbols.clone(),
            values,
        }
    }

    /// Keep only the listed columns, in the given order.
    pub fn select_columns(&self, cols: &[usize]) -> Self {
        let symbols = cols.iter().map(|&c| self.symbols[c].clone()).collect();
        let values = (0..self.len())
            .flat_map(|r| cols.iter().map(move |&c| (r, c)))
            .map(|(r, c)| self.get(r, c))
            .collect();
        Self {
            dates: self.dates.clone(),
            symbols,
            values,
        }
    }
}

/// Read-only window over the leading rows of a [`DateMatrix`].
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    dates: &'a [NaiveDate],
    symbols: &'a [String],
    values: &'a [f64],
}

impl<'a> MatrixView<'a> {
    /// Restrict the view to rows `0..=row`.
    pub fn through(self, row: usize) -> MatrixView<'a> {
        let rows = (row + 1).min(self.dates.len());
        self.take(rows)
    }

    /// Restrict the view to its first `rows` rows.
    pub fn take(self, rows: usize) -> MatrixView<'a> {
        let rows = rows.min(self.dates.len());
        MatrixView {
            dates: &self.dates[..rows],
            symbols: self.symbols,
            values: &self.values[..rows * self.symbols.len()],
        }
    }

    pub fn dates(&self) -> &'a [NaiveDate] {
        self.dates
    }

    pub fn symbols(&self) -> &'a [String] {
        self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn width(&self) -> usize {
        self.symbols.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width() + col]
    }

    pub fn row(&self, row: usize) -> &'a [f64] {
        let width = self.width();
        &self.values[row * width..(row + 1) * width]
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + 'a {
        let width = self.width();
        self.values.iter().skip(col).step_by(width.max(1)).copied()
    }

    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.width()];
        for r in 0..self.len() {
            for (sum, v) in sums.iter_mut().zip(self.row(r)) {
                *sum += v;
            }
        }
        sums
    }
}
