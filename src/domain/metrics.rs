//! Performance metrics for a completed replay.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::sim::ClosedRound;

/// Equity snapshot taken after each replay step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub at: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough decline, as a fraction (0.2 = -20%).
    pub max_drawdown: f64,
    /// Fraction of closed entry-exit rounds with positive P&L.
    pub win_rate: f64,
    pub total_trades: usize,
    pub avg_hold_time_mins: f64,
    pub profit_factor: f64,
    pub equity_curve: Vec<EquityPoint>,
}

/// Compute metrics from the equity curve and the closed-round ledger.
///
/// `total_trades` counts fills, not rounds; win rate and hold time come from
/// the rounds.
pub fn compute_metrics(
    initial_cash: f64,
    equity_curve: Vec<EquityPoint>,
    closed_rounds: &[ClosedRound],
    total_trades: usize,
) -> PerformanceMetrics {
    let final_equity = equity_curve
        .last()
        .map(|p| p.equity)
        .unwrap_or(initial_cash);
    let total_return_pct = if initial_cash > 0.0 {
        (final_equity - initial_cash) / initial_cash * 100.0
    } else {
        0.0
    };

    let wins = closed_rounds.iter().filter(|r| r.pnl > 0.0).count();
    let win_rate = if closed_rounds.is_empty() {
        0.0
    } else {
        wins as f64 / closed_rounds.len() as f64
    };

    let total_hold_mins: f64 = closed_rounds
        .iter()
        .map(|r| (r.exit_at - r.entry_at).num_minutes() as f64)
        .sum();
    let avg_hold_time_mins = if closed_rounds.is_empty() {
        0.0
    } else {
        total_hold_mins / closed_rounds.len() as f64
    };

    PerformanceMetrics {
        total_return_pct,
        sharpe_ratio: sharpe(&equity_curve),
        max_drawdown: max_drawdown(&equity_curve),
        win_rate,
        total_trades,
        avg_hold_time_mins,
        profit_factor: profit_factor(closed_rounds),
        equity_curve,
    }
}

/// Mean over standard deviation of per-step returns, annualized by sqrt(252).
///
/// The sqrt(252) factor assumes daily sampling, while the curve is sampled
/// per replay step (default 15 minutes), so the annualization overstates at
/// finer steps. Kept for comparability across runs with the same step; a
/// step-aware factor is a possible follow-up.
fn sharpe(curve: &[EquityPoint]) -> f64 {
    if curve.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    mean / std_dev * 252.0_f64.sqrt()
}

/// Largest fractional decline from any running peak.
fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let drawdown = (peak - point.equity) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

/// Gross wins over gross losses. All-winning history reads infinity,
/// no-trade history reads 0.
fn profit_factor(closed_rounds: &[ClosedRound]) -> f64 {
    let gross_wins: f64 = closed_rounds.iter().filter(|r| r.pnl > 0.0).map(|r| r.pnl).sum();
    let gross_losses: f64 = closed_rounds
        .iter()
        .filter(|r| r.pnl < 0.0)
        .map(|r| -r.pnl)
        .sum();
    if gross_losses == 0.0 {
        if gross_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        gross_wins / gross_losses
    }
}
