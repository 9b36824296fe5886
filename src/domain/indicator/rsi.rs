//! Relative Strength Index.
//!
//! Wilder-style formulation over the trailing window: average gain and
//! average loss across the last `period` price changes, then
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`.
//!
//! Degenerate windows: a perfectly flat window (no gains, no losses) reads
//! neutral at 50; a window with gains and no losses reads 100.

use super::{require_points, IndicatorError};
use crate::domain::context::PricePoint;

pub fn rsi(series: &[PricePoint], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(period));
    }
    // `period` changes need `period + 1` prices.
    require_points(series, period + 1)?;

    let window = &series[series.len() - (period + 1)..];
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;

    for pair in window.windows(2) {
        let change = pair[1].price - pair[0].price;
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum += -change;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return Ok(50.0);
        }
        return Ok(100.0);
    }

    Ok(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::minute_series;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rsi_flat_series_is_neutral() {
        let series = minute_series(&[100.0; 15]);
        assert_relative_eq!(rsi(&series, 14).unwrap(), 50.0);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let series = minute_series(&prices);
        assert_relative_eq!(rsi(&series, 14).unwrap(), 100.0);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = minute_series(&prices);
        assert_relative_eq!(rsi(&series, 14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_equal_gains_and_losses_is_50() {
        // Alternating +1/-1: equal average gain and loss.
        let prices: Vec<f64> = (0..15)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let series = minute_series(&prices);
        assert_relative_eq!(rsi(&series, 14).unwrap(), 50.0);
    }

    #[test]
    fn rsi_insufficient_data() {
        let series = minute_series(&[100.0; 14]);
        assert_eq!(
            rsi(&series, 14),
            Err(IndicatorError::InsufficientData {
                needed: 15,
                have: 14
            })
        );
    }

    #[test]
    fn rsi_uses_only_trailing_window() {
        // Old crash outside the window must not affect the reading.
        let mut prices = vec![500.0, 10.0];
        prices.extend((0..15).map(|i| 100.0 + i as f64));
        let series = minute_series(&prices);
        assert_relative_eq!(rsi(&series, 14).unwrap(), 100.0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rsi_stays_in_range(prices in proptest::collection::vec(1.0f64..1000.0, 15..60)) {
                let series = minute_series(&prices);
                let value = rsi(&series, 14).unwrap();
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }
    }
}
