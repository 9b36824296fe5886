//! Historical replay of a rule against a price path.
//!
//! The replay drives the same `evaluate_tick` the live engine uses, against a
//! [`SimPortfolio`] instead of real balances. Prices come from a [`PricePath`]
//! so historical data and synthetic walks plug into the same loop.

use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::domain::context::{EvalContext, PricePoint, PriceSeries};
use crate::domain::error::WardenError;
use crate::domain::evaluator::evaluate_tick;
use crate::domain::metrics::{compute_metrics, EquityPoint, PerformanceMetrics};
use crate::domain::rule::{Action, Rule};
use crate::domain::settings::{BacktestConfig, EngineConfig};
use crate::domain::sim::{SimPortfolio, TradeRecord};

/// Source of prices for the replay, advanced one step at a time.
pub trait PricePath {
    fn symbols(&self) -> Vec<String>;
    /// Prices as of `at`. Symbols without a price yet are absent.
    fn step(&mut self, at: chrono::DateTime<Utc>) -> HashMap<String, f64>;
}

/// Replays recorded series, holding each price until the next sample.
pub struct HistoricalPath {
    series: HashMap<String, PriceSeries>,
    cursors: HashMap<String, usize>,
    current: HashMap<String, f64>,
}

impl HistoricalPath {
    pub fn new(series: HashMap<String, PriceSeries>) -> Self {
        let cursors = series.keys().map(|s| (s.clone(), 0)).collect();
        HistoricalPath {
            series,
            cursors,
            current: HashMap::new(),
        }
    }
}

impl PricePath for HistoricalPath {
    fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    fn step(&mut self, at: chrono::DateTime<Utc>) -> HashMap<String, f64> {
        for (symbol, series) in &self.series {
            let cursor = self.cursors.entry(symbol.clone()).or_insert(0);
            while *cursor < series.len() && series[*cursor].at <= at {
                self.current.insert(symbol.clone(), series[*cursor].price);
                *cursor += 1;
            }
        }
        self.current.clone()
    }
}

/// Seeded geometric random walk, for exercising rules without recorded data.
pub struct RandomWalkPath {
    prices: HashMap<String, f64>,
    drift: f64,
    volatility: f64,
    rng: StdRng,
}

impl RandomWalkPath {
    pub fn new(
        initial_prices: HashMap<String, f64>,
        drift: f64,
        volatility: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RandomWalkPath {
            prices: initial_prices,
            drift,
            volatility,
            rng,
        }
    }
}

impl PricePath for RandomWalkPath {
    fn symbols(&self) -> Vec<String> {
        self.prices.keys().cloned().collect()
    }

    fn step(&mut self, _at: chrono::DateTime<Utc>) -> HashMap<String, f64> {
        for price in self.prices.values_mut() {
            let shock = self.rng.gen_range(-self.volatility..=self.volatility);
            *price *= 1.0 + self.drift + shock;
            if *price < 0.0 {
                *price = 0.0;
            }
        }
        self.prices.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPortfolio {
    pub cash: f64,
    pub holdings: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub rule_id: String,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub final_portfolio: FinalPortfolio,
}

/// Replay one rule over `[start, end)` at the configured step.
///
/// `cancel` is polled once per step; a set flag aborts the run with an error
/// rather than returning partial metrics.
pub fn run_backtest(
    rule: &Rule,
    bt: &BacktestConfig,
    engine: &EngineConfig,
    path: &mut dyn PricePath,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, WardenError> {
    let mut sim = SimPortfolio::new(bt.initial_cash, bt.numeraire.clone());
    let mut history: HashMap<String, PriceSeries> = HashMap::new();
    let mut last_executions = HashMap::new();
    let mut last_evaluations: HashMap<String, chrono::DateTime<Utc>> = HashMap::new();
    let mut recent_executions: Vec<chrono::DateTime<Utc>> = Vec::new();
    let mut realized_today = 0.0;
    let mut current_day: NaiveDate = bt.start.date_naive();
    let mut equity_curve = Vec::new();

    let step = Duration::minutes(bt.step_minutes as i64);
    let mut t = bt.start;
    while t < bt.end {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(WardenError::Backtest {
                rule_id: rule.id.clone(),
                reason: "cancelled".into(),
            });
        }

        // P&L-since-midnight resets on UTC day boundaries.
        if t.date_naive() != current_day {
            current_day = t.date_naive();
            realized_today = 0.0;
        }

        let mut prices = path.step(t);
        prices.insert(bt.numeraire.clone(), 1.0);
        for (symbol, &price) in &prices {
            if symbol == &bt.numeraire {
                continue;
            }
            history
                .entry(symbol.clone())
                .or_default()
                .push(PricePoint { at: t, price });
        }

        let mut ctx = EvalContext::new(t);
        ctx.portfolio.balances = sim.holdings.clone();
        ctx.portfolio.balances.insert(bt.numeraire.clone(), sim.cash);
        ctx.portfolio.prices = prices.clone();
        ctx.history = history.clone();
        ctx.last_executions = last_executions.clone();
        ctx.last_evaluations = last_evaluations.clone();
        ctx.recent_executions = recent_executions.clone();
        ctx.realized_pnl_today = realized_today;

        let due = match last_evaluations.get(&rule.id) {
            None => true,
            Some(&last) => t - last >= Duration::minutes(rule.trigger.interval_minutes as i64),
        };

        let intents = evaluate_tick(std::slice::from_ref(rule), &ctx, engine);
        for intent in &intents {
            let pnl = execute(&mut sim, &intent.action, &prices, t);
            realized_today += pnl;
            last_executions.insert(rule.id.clone(), t);
            recent_executions.push(t);
        }
        if due {
            last_evaluations.insert(rule.id.clone(), t);
        }

        equity_curve.push(EquityPoint {
            at: t,
            equity: sim.total_equity(&prices),
        });
        t += step;
    }

    let metrics = compute_metrics(
        bt.initial_cash,
        equity_curve,
        &sim.closed_rounds,
        sim.trades.len(),
    );
    Ok(BacktestResult {
        rule_id: rule.id.clone(),
        metrics,
        trades: sim.trades,
        final_portfolio: FinalPortfolio {
            cash: sim.cash,
            holdings: sim.holdings,
        },
    })
}

/// Replay every rule in isolation over its own fresh path, best Sharpe first.
/// A rule whose replay fails is logged and skipped; the rest still run.
pub fn run_batch<F>(
    rules: &[Rule],
    bt: &BacktestConfig,
    engine: &EngineConfig,
    mut make_path: F,
    cancel: Option<&AtomicBool>,
) -> Vec<BacktestResult>
where
    F: FnMut() -> Box<dyn PricePath>,
{
    let mut results = Vec::new();
    for rule in rules {
        let mut path = make_path();
        match run_backtest(rule, bt, engine, path.as_mut(), cancel) {
            Ok(result) => results.push(result),
            Err(err) => warn!(rule = %rule.id, %err, "backtest failed, skipping rule"),
        }
    }
    results.sort_by(|a, b| {
        b.metrics
            .sharpe_ratio
            .partial_cmp(&a.metrics.sharpe_ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

/// Apply one accepted intent to the simulated portfolio. Returns realized P&L.
fn execute(
    sim: &mut SimPortfolio,
    action: &Action,
    prices: &HashMap<String, f64>,
    at: chrono::DateTime<Utc>,
) -> f64 {
    match action {
        Action::Enter {
            symbol,
            allocation_pct,
        } => {
            let Some(&price) = prices.get(symbol) else {
                return 0.0;
            };
            let equity = sim.total_equity(prices);
            if *allocation_pct >= 0.0 {
                sim.buy(symbol, allocation_pct / 100.0 * equity, price, at);
                0.0
            } else {
                // Negative allocation is a sell sized against total equity.
                let quantity = -allocation_pct / 100.0 * equity / price;
                sim.sell(symbol, quantity, price, at)
            }
        }
        Action::Exit {
            symbol,
            allocation_pct,
        } => {
            let Some(&price) = prices.get(symbol) else {
                return 0.0;
            };
            let quantity = allocation_pct / 100.0 * sim.holding(symbol);
            sim.sell(symbol, quantity, price, at)
        }
        Action::Rebalance { target } => {
            let equity = sim.total_equity(prices);
            let mut pnl = 0.0;
            // Sells free cash before buys consume it.
            for (symbol, weight) in target {
                let Some(&price) = prices.get(symbol) else {
                    continue;
                };
                let current = sim.holding(symbol) * price;
                let desired = weight / 100.0 * equity;
                if current > desired {
                    pnl += sim.sell(symbol, (current - desired) / price, price, at);
                }
            }
            for (symbol, weight) in target {
                let Some(&price) = prices.get(symbol) else {
                    continue;
                };
                let current = sim.holding(symbol) * price;
                let desired = weight / 100.0 * equity;
                if desired > current {
                    sim.buy(symbol, desired - current, price, at);
                }
            }
            pnl
        }
    }
}
