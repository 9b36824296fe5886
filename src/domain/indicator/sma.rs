//! Simple moving average.

use super::{require_points, IndicatorError};
use crate::domain::context::PricePoint;

/// Arithmetic mean of the last `period` prices.
pub fn sma(series: &[PricePoint], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(period));
    }
    require_points(series, period)?;

    let window = &series[series.len() - period..];
    let sum: f64 = window.iter().map(|p| p.price).sum();
    Ok(sum / period as f64)
}
