//! Percentage price change over a wall-clock window.

use super::IndicatorError;
use crate::domain::context::PricePoint;
use chrono::Duration;

/// `(last - first) / first * 100` where `first` is the earliest point inside
/// the trailing `window_minutes` window, measured back from the newest sample.
pub fn price_change_pct(
    series: &[PricePoint],
    window_minutes: u32,
) -> Result<f64, IndicatorError> {
    let last = series.last().ok_or(IndicatorError::InsufficientData {
        needed: 2,
        have: 0,
    })?;

    let cutoff = last.at - Duration::minutes(window_minutes as i64);
    let first = series
        .iter()
        .find(|p| p.at >= cutoff)
        .ok_or(IndicatorError::InsufficientData {
            needed: 2,
            have: series.len(),
        })?;

    // A window covering a single sample has no change to measure.
    if first.at == last.at {
        return Err(IndicatorError::InsufficientData {
            needed: 2,
            have: 1,
        });
    }
    if first.price == 0.0 {
        return Err(IndicatorError::ZeroBasePrice);
    }

    Ok((last.price - first.price) / first.price * 100.0)
}
