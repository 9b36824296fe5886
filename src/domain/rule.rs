//! Rule data model.
//!
//! A rule is a declarative trigger + condition + action + risk specification:
//! - `Trigger`: evaluation cadence
//! - `Condition`: one testable predicate per variant, AND-combined in order
//! - `Action`: what to do when the rule fires, executed independently
//! - `RiskSpec`: per-rule limits and the named guardrail set

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub risk: Option<RiskSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub interval_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Condition {
    Indicator {
        indicator: IndicatorKind,
        symbol: String,
        period: usize,
        lt: Option<f64>,
        gt: Option<f64>,
    },
    PriceChange {
        symbol: String,
        window_minutes: u32,
        lt: Option<f64>,
        gt: Option<f64>,
    },
    PortfolioExposure {
        symbol: String,
        lt_pct: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Rsi,
    Sma,
    Volatility,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Enter {
        symbol: String,
        allocation_pct: f64,
    },
    Exit {
        symbol: String,
        allocation_pct: f64,
    },
    Rebalance {
        target: BTreeMap<String, f64>,
    },
}

impl Action {
    /// The symbol a single-asset action trades. Rebalance touches many.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Action::Enter { symbol, .. } | Action::Exit { symbol, .. } => Some(symbol),
            Action::Rebalance { .. } => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Action::Enter { .. })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Action::Exit { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSpec {
    pub max_position_pct: Option<f64>,
    pub cooldown_secs: Option<u64>,
    pub guardrails: BTreeSet<Guardrail>,
    pub max_daily_loss_pct: Option<f64>,
}

impl RiskSpec {
    pub fn empty() -> Self {
        RiskSpec {
            max_position_pct: None,
            cooldown_secs: None,
            guardrails: BTreeSet::new(),
            max_daily_loss_pct: None,
        }
    }

    pub fn has_guardrail(&self, guardrail: Guardrail) -> bool {
        self.guardrails.contains(&guardrail)
    }
}

/// Named risk checks that can block an intent. A typed enum rather than
/// string tags so unknown names fail at parse time, not silently at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Guardrail {
    BaselineProtection,
}

impl Guardrail {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "baselineProtection" => Some(Guardrail::BaselineProtection),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Guardrail::BaselineProtection => "baselineProtection",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Rsi => write!(f, "RSI"),
            IndicatorKind::Sma => write!(f, "SMA"),
            IndicatorKind::Volatility => write!(f, "VOLATILITY"),
        }
    }
}

impl Rule {
    /// Cooldown window, if the rule carries one.
    pub fn cooldown_secs(&self) -> Option<u64> {
        self.risk.as_ref().and_then(|r| r.cooldown_secs)
    }

    pub fn has_guardrail(&self, guardrail: Guardrail) -> bool {
        self.risk
            .as_ref()
            .is_some_and(|r| r.has_guardrail(guardrail))
    }
}
