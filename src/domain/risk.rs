//! Risk/guardrail layer.
//!
//! An ordered chain of guardrail checks, each a pure function of the rule,
//! context, and candidate intent. The chain short-circuits on the first
//! failure and never errors: the outcome is always a structured allow/block
//! decision with a human-readable reason. New guardrails are added to
//! [`CHECKS`] without touching the evaluator.

use chrono::Duration;

use crate::domain::context::EvalContext;
use crate::domain::intent::Intent;
use crate::domain::rule::{Action, Guardrail, Rule};
use crate::domain::settings::EngineConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Allowed,
    Blocked { reason: String },
}

impl RiskDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskDecision::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RiskDecision::Allowed => None,
            RiskDecision::Blocked { reason } => Some(reason),
        }
    }
}

type GuardrailCheck = fn(&Rule, &EvalContext, &Intent, &EngineConfig) -> Option<String>;

/// Checks run in order; the first to return a reason blocks the intent.
const CHECKS: &[GuardrailCheck] = &[
    check_cooldown,
    check_baseline_protection,
    check_max_position,
    check_velocity,
    check_daily_loss,
];

pub fn apply_risk(
    rule: &Rule,
    ctx: &EvalContext,
    intent: &Intent,
    cfg: &EngineConfig,
) -> RiskDecision {
    for check in CHECKS {
        if let Some(reason) = check(rule, ctx, intent, cfg) {
            return RiskDecision::Blocked { reason };
        }
    }
    RiskDecision::Allowed
}

/// Seconds left on the rule's cooldown, if one is running.
pub fn cooldown_remaining(rule: &Rule, ctx: &EvalContext) -> Option<i64> {
    let cooldown = rule.cooldown_secs()?;
    let last = ctx.last_execution(&rule.id)?;
    let elapsed = (ctx.now - last).num_seconds();
    let remaining = cooldown as i64 - elapsed;
    (remaining > 0).then_some(remaining)
}

fn check_cooldown(
    rule: &Rule,
    ctx: &EvalContext,
    _intent: &Intent,
    _cfg: &EngineConfig,
) -> Option<String> {
    cooldown_remaining(rule, ctx).map(|remaining| {
        format!(
            "Cooldown active for '{}': {}s of {}s remaining",
            rule.name,
            remaining,
            rule.cooldown_secs().unwrap_or(0)
        )
    })
}

/// Baseline protection: while the guardrail is active, no intent may, if
/// executed, take a core-asset holding below its baseline.
fn check_baseline_protection(
    rule: &Rule,
    ctx: &EvalContext,
    intent: &Intent,
    _cfg: &EngineConfig,
) -> Option<String> {
    if !rule.has_guardrail(Guardrail::BaselineProtection) {
        return None;
    }

    match &intent.action {
        Action::Exit {
            symbol,
            allocation_pct,
        } => check_baseline_sell(ctx, symbol, *allocation_pct),
        // An enter with negative allocation is a disguised sell.
        Action::Enter {
            symbol,
            allocation_pct,
        } if *allocation_pct < 0.0 => check_baseline_sell(ctx, symbol, -allocation_pct),
        Action::Enter { .. } => None,
        Action::Rebalance { target } => {
            for (symbol, target_pct) in target {
                if let Some(reason) = check_baseline_target(ctx, symbol, *target_pct) {
                    return Some(reason);
                }
            }
            None
        }
    }
}

fn check_baseline_sell(ctx: &EvalContext, symbol: &str, allocation_pct: f64) -> Option<String> {
    let baseline = ctx.objectives.baseline(symbol)?;
    let Some(price) = ctx.portfolio.price(symbol) else {
        return Some(format!(
            "Baseline protection: no price for core asset {symbol}"
        ));
    };
    if price <= 0.0 {
        return Some(format!(
            "Baseline protection: non-positive price for core asset {symbol}"
        ));
    }

    let holding = ctx.portfolio.holding(symbol);
    let qty_to_sell = allocation_pct / 100.0 * ctx.portfolio.total_value() / price;
    if holding - qty_to_sell < baseline {
        return Some(format!(
            "Baseline protection: selling {qty_to_sell:.8} {symbol} would leave \
             {:.8}, below baseline {baseline:.8}",
            holding - qty_to_sell
        ));
    }
    None
}

fn check_baseline_target(ctx: &EvalContext, symbol: &str, target_pct: f64) -> Option<String> {
    let baseline = ctx.objectives.baseline(symbol)?;
    let price = ctx.portfolio.price(symbol)?;
    if price <= 0.0 {
        return None;
    }
    let qty_after = target_pct / 100.0 * ctx.portfolio.total_value() / price;
    if qty_after < baseline {
        return Some(format!(
            "Baseline protection: rebalancing {symbol} to {target_pct}% would leave \
             {qty_after:.8}, below baseline {baseline:.8}"
        ));
    }
    None
}

fn check_max_position(
    rule: &Rule,
    ctx: &EvalContext,
    intent: &Intent,
    _cfg: &EngineConfig,
) -> Option<String> {
    let max_pct = rule.risk.as_ref()?.max_position_pct?;
    let Action::Enter {
        symbol,
        allocation_pct,
    } = &intent.action
    else {
        return None;
    };
    if *allocation_pct <= 0.0 {
        return None;
    }

    let total = ctx.portfolio.total_value();
    if total <= 0.0 {
        return None;
    }
    // Converting numeraire into the symbol leaves total equity unchanged.
    let post_value = ctx.portfolio.symbol_value(symbol) + allocation_pct / 100.0 * total;
    let post_exposure = post_value / total * 100.0;
    if post_exposure > max_pct {
        return Some(format!(
            "Max position: entry would push {symbol} to {post_exposure:.2}% of \
             portfolio, above the {max_pct:.2}% cap"
        ));
    }
    None
}

fn check_velocity(
    _rule: &Rule,
    ctx: &EvalContext,
    _intent: &Intent,
    cfg: &EngineConfig,
) -> Option<String> {
    let accepted = ctx.executions_within(Duration::hours(1));
    if accepted >= cfg.max_intents_per_hour as usize {
        return Some(format!(
            "Velocity throttle: {accepted} intents accepted in the last hour \
             (cap {})",
            cfg.max_intents_per_hour
        ));
    }
    None
}

/// Blocks new entries once the day's realized loss breaches the limit.
/// Exits stay allowed so the portfolio can still de-risk.
fn check_daily_loss(
    rule: &Rule,
    ctx: &EvalContext,
    intent: &Intent,
    _cfg: &EngineConfig,
) -> Option<String> {
    let max_loss_pct = rule.risk.as_ref()?.max_daily_loss_pct?;
    if !intent.action.is_entry() {
        return None;
    }

    let limit = -(max_loss_pct / 100.0) * ctx.portfolio.total_value();
    if ctx.realized_pnl_today < limit {
        return Some(format!(
            "Daily loss circuit breaker: realized {:.2} today, below limit {:.2}",
            ctx.realized_pnl_today, limit
        ));
    }
    None
}
