//! Portfolio exposure.

use crate::domain::context::PortfolioState;

/// Value of `symbol` as a percentage of total portfolio value.
///
/// An empty or unpriced portfolio reads 0%, so exposure ceilings never block
/// the first entry into a fresh portfolio.
pub fn portfolio_exposure_pct(portfolio: &PortfolioState, symbol: &str) -> f64 {
    let total = portfolio.total_value();
    if total <= 0.0 {
        return 0.0;
    }
    portfolio.symbol_value(symbol) / total * 100.0
}
