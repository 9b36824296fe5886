//! Per-tick rule evaluation.
//!
//! For each enabled rule, in stored order: trigger-cadence gate, cooldown
//! gate, AND-combined conditions, then one candidate intent per action routed
//! through the risk layer. A condition that cannot be computed (missing price
//! or short history) counts as not satisfied and is logged; it never halts
//! evaluation of the remaining rules. The evaluator does not mutate
//! `last_executions` — the caller updates that state only after an intent is
//! actually accepted for execution, which prevents double-fires inside a tick.

use chrono::Duration;
use tracing::debug;

use crate::domain::context::EvalContext;
use crate::domain::indicator::{self, IndicatorError};
use crate::domain::intent::Intent;
use crate::domain::risk::{self, RiskDecision};
use crate::domain::rule::{Action, Condition, IndicatorKind, Rule};
use crate::domain::settings::EngineConfig;

/// Evaluate all rules against one immutable context snapshot.
///
/// Evaluating the same context twice yields identical intent lists.
pub fn evaluate_tick(rules: &[Rule], ctx: &EvalContext, cfg: &EngineConfig) -> Vec<Intent> {
    let mut intents = Vec::new();

    for rule in rules {
        if !rule.enabled {
            continue;
        }
        if !trigger_due(rule, ctx) {
            continue;
        }
        if let Some(remaining) = risk::cooldown_remaining(rule, ctx) {
            debug!(rule = %rule.name, remaining_secs = remaining, "skipped: cooldown");
            continue;
        }
        if !conditions_hold(rule, ctx) {
            continue;
        }

        for action in &rule.actions {
            let mut intent = Intent {
                rule_id: rule.id.clone(),
                action: action.clone(),
                requires_approval: true,
                dry_run: cfg.dry_run,
            };

            match risk::apply_risk(rule, ctx, &intent, cfg) {
                RiskDecision::Blocked { reason } => {
                    debug!(rule = %rule.name, %reason, "intent blocked");
                }
                RiskDecision::Allowed => {
                    intent.requires_approval = !auto_executable(&intent.action, ctx);
                    intents.push(intent);
                }
            }
        }
    }

    intents
}

/// True once the trigger interval has elapsed since the rule's last
/// evaluation. Rules never evaluated before are due immediately.
fn trigger_due(rule: &Rule, ctx: &EvalContext) -> bool {
    match ctx.last_evaluations.get(&rule.id) {
        None => true,
        Some(&last) => ctx.now - last >= Duration::minutes(rule.trigger.interval_minutes as i64),
    }
}

fn conditions_hold(rule: &Rule, ctx: &EvalContext) -> bool {
    for (i, condition) in rule.conditions.iter().enumerate() {
        match evaluate_condition(condition, ctx) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                debug!(
                    rule = %rule.name,
                    condition = i,
                    %err,
                    "condition not computable, treating as unsatisfied"
                );
                return false;
            }
        }
    }
    true
}

/// Evaluate one condition against the context.
///
/// `lt`/`gt` bounds that are absent hold vacuously; when both are present,
/// both must hold.
pub fn evaluate_condition(
    condition: &Condition,
    ctx: &EvalContext,
) -> Result<bool, IndicatorError> {
    match condition {
        Condition::Indicator {
            indicator,
            symbol,
            period,
            lt,
            gt,
        } => {
            let series = series_for(ctx, symbol)?;
            let value = match indicator {
                IndicatorKind::Rsi => indicator::rsi(series, *period)?,
                IndicatorKind::Sma => indicator::sma(series, *period)?,
                IndicatorKind::Volatility => indicator::volatility(series, *period)?,
            };
            Ok(within_bounds(value, *lt, *gt))
        }
        Condition::PriceChange {
            symbol,
            window_minutes,
            lt,
            gt,
        } => {
            let series = series_for(ctx, symbol)?;
            let change = indicator::price_change_pct(series, *window_minutes)?;
            Ok(within_bounds(change, *lt, *gt))
        }
        Condition::PortfolioExposure { symbol, lt_pct } => {
            let exposure = indicator::portfolio_exposure_pct(&ctx.portfolio, symbol);
            Ok(exposure < *lt_pct)
        }
    }
}

fn series_for<'a>(
    ctx: &'a EvalContext,
    symbol: &str,
) -> Result<&'a [crate::domain::context::PricePoint], IndicatorError> {
    ctx.series(symbol)
        .map(|s| s.as_slice())
        .ok_or(IndicatorError::InsufficientData { needed: 1, have: 0 })
}

fn within_bounds(value: f64, lt: Option<f64>, gt: Option<f64>) -> bool {
    lt.is_none_or(|bound| value < bound) && gt.is_none_or(|bound| value > bound)
}

/// Auto-execution applies only to single-asset actions on core assets, and
/// only when the objectives opt in.
fn auto_executable(action: &Action, ctx: &EvalContext) -> bool {
    ctx.objectives.auto_execute_core_assets
        && action
            .symbol()
            .is_some_and(|symbol| ctx.objectives.is_core_asset(symbol))
}
