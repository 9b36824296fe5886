//! Engine, backtest, and optimizer configuration.
//!
//! Builders read a [`ConfigPort`] and validate eagerly, so a bad config file
//! fails up front with the offending section/key named, not mid-replay.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::error::WardenError;
use crate::ports::config_port::ConfigPort;

/// Live-evaluation settings shared by every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Velocity cap: accepted intents across all rules per trailing hour.
    pub max_intents_per_hour: u32,
    /// When set, emitted intents are marked dry-run and must not be executed.
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_intents_per_hour: 10,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step_minutes: u32,
    pub initial_cash: f64,
    pub numeraire: String,
    /// Seed for the synthetic price walk; None draws from entropy.
    pub seed: Option<u64>,
    /// Per-step drift of the synthetic walk, as a fraction.
    pub walk_drift: f64,
    /// Per-step shock half-range of the synthetic walk, as a fraction.
    pub walk_volatility: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Rules scoring at or above this are left alone.
    pub score_threshold: f64,
    /// Drawdown cap used both for score normalization and as a hard trigger.
    pub drawdown_cap: f64,
    /// Minimum evaluation periods before optimization is attempted.
    pub min_samples: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            score_threshold: 0.7,
            drawdown_cap: 0.25,
            min_samples: 5,
        }
    }
}

pub fn engine_config_from(config: &dyn ConfigPort) -> Result<EngineConfig, WardenError> {
    let max_intents = config.get_int("engine", "max_intents_per_hour", 10);
    if max_intents <= 0 {
        return Err(WardenError::ConfigInvalid {
            section: "engine".into(),
            key: "max_intents_per_hour".into(),
            reason: format!("must be positive, got {max_intents}"),
        });
    }
    Ok(EngineConfig {
        max_intents_per_hour: max_intents as u32,
        dry_run: config.get_bool("engine", "dry_run", false),
    })
}

pub fn backtest_config_from(config: &dyn ConfigPort) -> Result<BacktestConfig, WardenError> {
    let start = require_date(config, "backtest", "start")?;
    let end = require_date(config, "backtest", "end")?;
    if end <= start {
        return Err(WardenError::ConfigInvalid {
            section: "backtest".into(),
            key: "end".into(),
            reason: "must be after start".into(),
        });
    }

    let step_minutes = config.get_int("backtest", "step_minutes", 15);
    if step_minutes <= 0 {
        return Err(WardenError::ConfigInvalid {
            section: "backtest".into(),
            key: "step_minutes".into(),
            reason: format!("must be positive, got {step_minutes}"),
        });
    }

    let initial_cash = config.get_double("backtest", "initial_cash", 10_000.0);
    if initial_cash <= 0.0 {
        return Err(WardenError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_cash".into(),
            reason: format!("must be positive, got {initial_cash}"),
        });
    }

    let seed = match config.get_string("backtest", "seed") {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| WardenError::ConfigInvalid {
            section: "backtest".into(),
            key: "seed".into(),
            reason: format!("expected unsigned integer, got '{raw}'"),
        })?),
        None => None,
    };

    Ok(BacktestConfig {
        start,
        end,
        step_minutes: step_minutes as u32,
        initial_cash,
        numeraire: config
            .get_string("backtest", "numeraire")
            .unwrap_or_else(|| "USD".to_string()),
        seed,
        walk_drift: config.get_double("backtest", "walk_drift", 0.0),
        walk_volatility: config.get_double("backtest", "walk_volatility", 0.01),
    })
}

pub fn optimizer_config_from(config: &dyn ConfigPort) -> Result<OptimizerConfig, WardenError> {
    let defaults = OptimizerConfig::default();
    let score_threshold =
        config.get_double("optimizer", "score_threshold", defaults.score_threshold);
    let drawdown_cap = config.get_double("optimizer", "drawdown_cap", defaults.drawdown_cap);
    if drawdown_cap <= 0.0 {
        return Err(WardenError::ConfigInvalid {
            section: "optimizer".into(),
            key: "drawdown_cap".into(),
            reason: format!("must be positive, got {drawdown_cap}"),
        });
    }
    let min_samples = config.get_int("optimizer", "min_samples", defaults.min_samples as i64);
    if min_samples < 0 {
        return Err(WardenError::ConfigInvalid {
            section: "optimizer".into(),
            key: "min_samples".into(),
            reason: format!("must be non-negative, got {min_samples}"),
        });
    }

    Ok(OptimizerConfig {
        score_threshold,
        drawdown_cap,
        min_samples: min_samples as u32,
    })
}

fn require_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<DateTime<Utc>, WardenError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| WardenError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })?;
    let date =
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| WardenError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("expected YYYY-MM-DD, got '{raw}': {e}"),
        })?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}
