//! CSV price history adapter.
//!
//! One file per symbol under the base directory, named `{SYMBOL}.csv`, with
//! a header row and `timestamp,price` columns. Timestamps are RFC 3339.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

use crate::domain::context::{PricePoint, PriceSeries};
use crate::domain::error::WardenError;
use crate::ports::price_port::PricePort;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

impl PricePort for CsvPriceAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, WardenError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Err(WardenError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| WardenError::NoData {
            symbol: format!("{symbol}: {e}"),
        })?;
        let mut series = PriceSeries::new();
        for record in rdr.records() {
            let record = record.map_err(|e| WardenError::NoData {
                symbol: format!("{symbol}: CSV parse error: {e}"),
            })?;

            let raw_at = record.get(0).ok_or_else(|| WardenError::NoData {
                symbol: format!("{symbol}: missing timestamp column"),
            })?;
            let at = DateTime::parse_from_rfc3339(raw_at)
                .map_err(|e| WardenError::NoData {
                    symbol: format!("{symbol}: invalid timestamp '{raw_at}': {e}"),
                })?
                .with_timezone(&Utc);
            if at < start || at > end {
                continue;
            }

            let price: f64 = record
                .get(1)
                .ok_or_else(|| WardenError::NoData {
                    symbol: format!("{symbol}: missing price column"),
                })?
                .trim()
                .parse()
                .map_err(|e| WardenError::NoData {
                    symbol: format!("{symbol}: invalid price: {e}"),
                })?;

            series.push(PricePoint { at, price });
        }

        series.sort_by_key(|p| p.at);
        Ok(series)
    }

    fn list_symbols(&self) -> Result<Vec<String>, WardenError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}
