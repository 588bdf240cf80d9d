//! Least-squares line fit and percentiles.
//!
//! ols:        β = (XᵀX)⁻¹ Xᵀy with design matrix X = [1, x]
//! percentile: linear interpolation between closest ranks, rank = p/100·(n-1)

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("need at least 2 observations, have {0}")]
    TooFewPoints(usize),

    #[error("regressor has no variance (singular design matrix)")]
    Singular,

    #[error("non-finite input")]
    NonFinite,
}

/// Singular values of XᵀX below this fraction of its norm count as zero.
const RANK_TOLERANCE: f64 = 1e-12;

/// Ordinary least squares with intercept.
pub fn ols(x: &[f64], y: &[f64]) -> Result<LinearFit, FitError> {
    let n = x.len().min(y.len());
    if n < 2 {
        return Err(FitError::TooFewPoints(n));
    }
    let (x, y) = (&x[..n], &y[..n]);
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let target = DVector::from_column_slice(y);

    let xtx = design.transpose() * &design;
    // try_inverse accepts a numerically rank-one XᵀX
    if xtx.rank(RANK_TOLERANCE * xtx.norm()) < 2 {
        return Err(FitError::Singular);
    }
    let xtx_inv = xtx.try_inverse().ok_or(FitError::Singular)?;
    let beta = xtx_inv * (design.transpose() * target);

    if !beta.iter().all(|b| b.is_finite()) {
        return Err(FitError::Singular);
    }
    Ok(LinearFit {
        intercept: beta[0],
        slope: beta[1],
    })
}

/// Percentile `p` (0..=100) of `values`. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
