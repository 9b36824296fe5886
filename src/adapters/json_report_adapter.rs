//! JSON report adapter.
//!
//! Pretty-printed JSON, one document per report, so results feed dashboards
//! and diff cleanly in version control.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::WardenError;
use crate::domain::optimizer::OptimizationCandidate;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), WardenError> {
        let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtests(
        &self,
        results: &[BacktestResult],
        path: &Path,
    ) -> Result<(), WardenError> {
        Self::write_json(&results, path)
    }

    fn write_candidates(
        &self,
        candidates: &[OptimizationCandidate],
        path: &Path,
    ) -> Result<(), WardenError> {
        Self::write_json(&candidates, path)
    }
}
