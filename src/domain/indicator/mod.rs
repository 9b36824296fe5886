//! Indicator library.
//!
//! Pure numeric functions over a chronologically ordered price series for one
//! symbol. Every function is deterministic and side-effect-free; a series too
//! short for the requested window yields [`IndicatorError::InsufficientData`]
//! rather than a panic, and the evaluator treats that as "condition not
//! satisfied" for the tick.

pub mod sma;
pub mod rsi;
pub mod volatility;
pub mod price_change;
pub mod exposure;

pub use exposure::portfolio_exposure_pct;
pub use price_change::price_change_pct;
pub use rsi::rsi;
pub use sma::sma;
pub use volatility::volatility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("insufficient data: have {have} points, need {needed}")]
    InsufficientData { needed: usize, have: usize },

    #[error("invalid period: {0}")]
    InvalidPeriod(usize),

    #[error("undefined: base price is zero")]
    ZeroBasePrice,
}

/// Require at least `needed` points in `series`.
pub(crate) fn require_points<T>(series: &[T], needed: usize) -> Result<(), IndicatorError> {
    if series.len() < needed {
        Err(IndicatorError::InsufficientData {
            needed,
            have: series.len(),
        })
    } else {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_reports_counts() {
        let err = require_points(&[1.0, 2.0], 5).unwrap_err();
        assert_eq!(err, IndicatorError::InsufficientData { needed: 5, have: 2 });
        assert_eq!(
            err.to_string(),
            "insufficient data: have 2 points, need 5"
        );
    }

    #[test]
    fn require_points_passes_at_boundary() {
        assert!(require_points(&[1.0, 2.0, 3.0], 3).is_ok());
    }
}
