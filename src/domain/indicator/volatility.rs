//! Return volatility.

use super::{require_points, IndicatorError};
use crate::domain::context::PricePoint;

/// Standard deviation of simple period-over-period returns across the last
/// `window` points. Population stddev over the `window - 1` returns.
pub fn volatility(series: &[PricePoint], window: usize) -> Result<f64, IndicatorError> {
    if window < 2 {
        return Err(IndicatorError::InvalidPeriod(window));
    }
    require_points(series, window)?;

    let tail = &series[series.len() - window..];
    let mut returns = Vec::with_capacity(window - 1);
    for pair in tail.windows(2) {
        if pair[0].price == 0.0 {
            return Err(IndicatorError::ZeroBasePrice);
        }
        returns.push((pair[1].price - pair[0].price) / pair[0].price);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Ok(variance.sqrt())
}
