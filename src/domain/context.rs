//! Per-tick evaluation context.
//!
//! The caller assembles an immutable `EvalContext` once per tick from its
//! persistence and market-data layers. The engine never mutates it; cooldown
//! timers and baselines are supplied fresh each invocation, so the core holds
//! no shared state and needs no locks.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One observed price for a symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub at: DateTime<Utc>,
    pub price: f64,
}

/// Chronologically ordered price history for one symbol.
pub type PriceSeries = Vec<PricePoint>;

/// Balances and spot prices as of `EvalContext::now`.
#[derive(Debug, Clone, Default)]
pub struct PortfolioState {
    /// symbol → quantity held
    pub balances: HashMap<String, f64>,
    /// symbol → USD price
    pub prices: HashMap<String, f64>,
}

impl PortfolioState {
    pub fn holding(&self, symbol: &str) -> f64 {
        self.balances.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    /// Total value of every priced holding, in the numeraire.
    pub fn total_value(&self) -> f64 {
        self.balances
            .iter()
            .filter_map(|(symbol, qty)| self.prices.get(symbol).map(|price| qty * price))
            .sum()
    }

    pub fn symbol_value(&self, symbol: &str) -> f64 {
        self.holding(symbol) * self.price(symbol).unwrap_or(0.0)
    }
}

/// Protected minimums for one core asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreAssetPolicy {
    /// Holdings must never drop below this while baseline protection is on.
    pub baseline: f64,
    /// Hard floor the baseline itself may be lowered to, kept for callers
    /// that renegotiate baselines; the guardrail enforces `baseline`.
    pub min_baseline: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Objectives {
    pub core_assets: HashMap<String, CoreAssetPolicy>,
    pub auto_execute_core_assets: bool,
}

impl Objectives {
    pub fn is_core_asset(&self, symbol: &str) -> bool {
        self.core_assets.contains_key(symbol)
    }

    pub fn baseline(&self, symbol: &str) -> Option<f64> {
        self.core_assets.get(symbol).map(|p| p.baseline)
    }
}

#[derive(Debug, Clone)]
pub struct EvalContext {
    pub now: DateTime<Utc>,
    pub portfolio: PortfolioState,
    pub objectives: Objectives,
    /// symbol → price history, oldest first.
    pub history: HashMap<String, PriceSeries>,
    /// rule id → last accepted-execution timestamp.
    pub last_executions: HashMap<String, DateTime<Utc>>,
    /// rule id → last time the rule's trigger was evaluated.
    pub last_evaluations: HashMap<String, DateTime<Utc>>,
    /// Timestamps of intents accepted across all rules, for the velocity window.
    pub recent_executions: Vec<DateTime<Utc>>,
    /// Realized P&L since local midnight, in the numeraire.
    pub realized_pnl_today: f64,
}

impl EvalContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        EvalContext {
            now,
            portfolio: PortfolioState::default(),
            objectives: Objectives::default(),
            history: HashMap::new(),
            last_executions: HashMap::new(),
            last_evaluations: HashMap::new(),
            recent_executions: Vec::new(),
            realized_pnl_today: 0.0,
        }
    }

    pub fn series(&self, symbol: &str) -> Option<&PriceSeries> {
        self.history.get(symbol)
    }

    pub fn last_execution(&self, rule_id: &str) -> Option<DateTime<Utc>> {
        self.last_executions.get(rule_id).copied()
    }

    /// Accepted intents inside the trailing window ending at `now`.
    pub fn executions_within(&self, window: chrono::Duration) -> usize {
        let cutoff = self.now - window;
        self.recent_executions
            .iter()
            .filter(|&&at| at > cutoff && at <= self.now)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, min, 0).unwrap()
    }

    fn sample_portfolio() -> PortfolioState {
        PortfolioState {
            balances: HashMap::from([("BTC".to_string(), 0.5), ("USD".to_string(), 10_000.0)]),
            prices: HashMap::from([("BTC".to_string(), 60_000.0), ("USD".to_string(), 1.0)]),
        }
    }

    #[test]
    fn total_value_sums_priced_holdings() {
        let p = sample_portfolio();
        assert!((p.total_value() - 40_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn total_value_skips_unpriced_symbols() {
        let mut p = sample_portfolio();
        p.balances.insert("MYSTERY".to_string(), 99.0);
        assert!((p.total_value() - 40_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn holding_defaults_to_zero() {
        let p = sample_portfolio();
        assert_eq!(p.holding("XRP"), 0.0);
        assert_eq!(p.price("XRP"), None);
    }

    #[test]
    fn symbol_value() {
        let p = sample_portfolio();
        assert!((p.symbol_value("BTC") - 30_000.0).abs() < f64::EPSILON);
        assert_eq!(p.symbol_value("XRP"), 0.0);
    }

    #[test]
    fn objectives_core_asset_lookup() {
        let objectives = Objectives {
            core_assets: HashMap::from([(
                "BTC".to_string(),
                CoreAssetPolicy {
                    baseline: 0.25,
                    min_baseline: 0.1,
                },
            )]),
            auto_execute_core_assets: true,
        };
        assert!(objectives.is_core_asset("BTC"));
        assert!(!objectives.is_core_asset("DOGE"));
        assert_eq!(objectives.baseline("BTC"), Some(0.25));
        assert_eq!(objectives.baseline("DOGE"), None);
    }

    #[test]
    fn executions_within_window() {
        let mut ctx = EvalContext::new(ts(12, 0));
        ctx.recent_executions = vec![ts(10, 30), ts(11, 15), ts(11, 59)];
        assert_eq!(ctx.executions_within(chrono::Duration::hours(1)), 2);
        assert_eq!(ctx.executions_within(chrono::Duration::hours(3)), 3);
    }

    #[test]
    fn executions_in_the_future_are_ignored() {
        let mut ctx = EvalContext::new(ts(12, 0));
        ctx.recent_executions = vec![ts(13, 0)];
        assert_eq!(ctx.executions_within(chrono::Duration::hours(1)), 0);
    }
}
