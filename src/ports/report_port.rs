//! Report output port trait.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::WardenError;
use crate::domain::optimizer::OptimizationCandidate;

/// Port for writing backtest and optimization reports.
pub trait ReportPort {
    fn write_backtests(&self, results: &[BacktestResult], path: &Path)
        -> Result<(), WardenError>;

    fn write_candidates(
        &self,
        candidates: &[OptimizationCandidate],
        path: &Path,
    ) -> Result<(), WardenError>;
}
