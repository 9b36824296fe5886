//! Price history access port trait.

use chrono::{DateTime, Utc};

use crate::domain::context::PriceSeries;
use crate::domain::error::WardenError;

pub trait PricePort {
    /// Price history for `symbol` inside `[start, end]`, oldest first.
    fn fetch_prices(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, WardenError>;

    fn list_symbols(&self) -> Result<Vec<String>, WardenError>;
}
