//! Offline rule optimization.
//!
//! Scores a rule's observed performance and, when it underperforms, proposes
//! mutated variants. Candidates are proposals only: each carries reasoning
//! and a confidence, and nothing is activated without an operator accepting
//! it.

use serde::{Deserialize, Serialize};

use crate::domain::rule::{Condition, IndicatorKind, Rule};
use crate::domain::settings::OptimizerConfig;

/// Aggregated live/backtest performance for one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePerformance {
    pub avg_sharpe: f64,
    /// Worst drawdown across evaluation periods, as a fraction.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trade_count: u32,
    pub total_pnl: f64,
    /// Distinct evaluation periods aggregated into these numbers.
    pub sample_periods: u32,
    /// Losing rounds entered while short-window volatility was elevated.
    #[serde(default)]
    pub high_volatility_losses: u32,
    #[serde(default)]
    pub trades_per_day: f64,
}

/// Rough expectation for a candidate, derived from the observed numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedMetrics {
    pub sharpe: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationCandidate {
    pub rule: Rule,
    pub projected: ProjectedMetrics,
    pub reasoning: String,
    /// 0..1, how strongly the observed numbers support this mutation.
    pub confidence: f64,
}

/// Composite quality score in [0, 1].
///
/// Sharpe is clamped to [0, 3] and normalized; drawdown is normalized against
/// the configured cap. Weights: 0.4 Sharpe, 0.3 win rate, 0.3 drawdown.
pub fn composite_score(perf: &RulePerformance, cfg: &OptimizerConfig) -> f64 {
    let sharpe_term = perf.avg_sharpe.clamp(0.0, 3.0) / 3.0;
    let drawdown_term = 1.0 - (perf.max_drawdown / cfg.drawdown_cap).min(1.0);
    0.4 * sharpe_term + 0.3 * perf.win_rate.clamp(0.0, 1.0) + 0.3 * drawdown_term
}

/// Propose mutated variants of an underperforming rule.
///
/// Returns nothing when the sample is too small to trust, or when the rule
/// already scores at or above the threshold with drawdown inside the cap.
/// Each candidate applies exactly one mutation, so an operator can attribute
/// any performance change to it.
pub fn propose_candidates(
    rule: &Rule,
    perf: &RulePerformance,
    cfg: &OptimizerConfig,
) -> Vec<OptimizationCandidate> {
    if perf.sample_periods < cfg.min_samples {
        return Vec::new();
    }
    let score = composite_score(perf, cfg);
    if score >= cfg.score_threshold && perf.max_drawdown <= cfg.drawdown_cap {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    if let Some(c) = tighten_rsi(rule, perf) {
        candidates.push(c);
    }
    if let Some(c) = halve_allocations(rule, perf) {
        candidates.push(c);
    }
    if let Some(c) = add_volatility_filter(rule, perf) {
        candidates.push(c);
    }
    if let Some(c) = lengthen_cooldown(rule, perf) {
        candidates.push(c);
    }
    candidates
}

/// A rule that wins often but still scores poorly is likely entering too
/// early; tightening RSI bounds makes entries more selective.
fn tighten_rsi(rule: &Rule, perf: &RulePerformance) -> Option<OptimizationCandidate> {
    if perf.win_rate <= 0.6 {
        return None;
    }
    let mut touched = false;
    let mut variant = variant_of(rule, "tight-rsi", "tighter RSI");
    for condition in &mut variant.conditions {
        if let Condition::Indicator {
            indicator: IndicatorKind::Rsi,
            lt,
            gt,
            ..
        } = condition
        {
            if let Some(bound) = lt {
                *bound = (*bound - 5.0).max(20.0);
                touched = true;
            }
            if let Some(bound) = gt {
                *bound = (*bound + 5.0).min(80.0);
                touched = true;
            }
        }
    }
    if !touched {
        return None;
    }

    Some(OptimizationCandidate {
        rule: variant,
        projected: ProjectedMetrics {
            sharpe: perf.avg_sharpe + 0.2,
            win_rate: (perf.win_rate + 0.05).min(1.0),
            max_drawdown: perf.max_drawdown,
        },
        reasoning: format!(
            "win rate {:.0}% suggests the signal is sound but entries are early; \
             tightening RSI bounds by 5 points makes entries more selective",
            perf.win_rate * 100.0
        ),
        confidence: 0.6,
    })
}

/// Deep drawdowns with unchanged signals call for smaller position sizes.
fn halve_allocations(rule: &Rule, perf: &RulePerformance) -> Option<OptimizationCandidate> {
    if perf.max_drawdown <= 0.15 {
        return None;
    }
    let mut touched = false;
    let mut variant = variant_of(rule, "half-size", "half size");
    for action in &mut variant.actions {
        if let crate::domain::rule::Action::Enter { allocation_pct, .. } = action {
            *allocation_pct /= 2.0;
            touched = true;
        }
    }
    if !touched {
        return None;
    }

    Some(OptimizationCandidate {
        rule: variant,
        projected: ProjectedMetrics {
            sharpe: perf.avg_sharpe,
            win_rate: perf.win_rate,
            max_drawdown: perf.max_drawdown / 2.0,
        },
        reasoning: format!(
            "max drawdown {:.0}% exceeds 15%; halving entry allocations roughly \
             halves exposure per signal",
            perf.max_drawdown * 100.0
        ),
        confidence: 0.7,
    })
}

/// Repeated losses during volatile stretches: gate entries on calm markets.
fn add_volatility_filter(rule: &Rule, perf: &RulePerformance) -> Option<OptimizationCandidate> {
    if perf.high_volatility_losses <= 5 {
        return None;
    }
    let symbol = rule
        .actions
        .iter()
        .find_map(|a| a.symbol().map(str::to_string))?;
    let mut variant = variant_of(rule, "vol-filter", "volatility filter");
    variant.conditions.push(Condition::Indicator {
        indicator: IndicatorKind::Volatility,
        symbol,
        period: 20,
        lt: Some(0.05),
        gt: None,
    });

    Some(OptimizationCandidate {
        rule: variant,
        projected: ProjectedMetrics {
            sharpe: perf.avg_sharpe + 0.1,
            win_rate: (perf.win_rate + 0.1).min(1.0),
            max_drawdown: perf.max_drawdown,
        },
        reasoning: format!(
            "{} losing rounds opened during elevated volatility; adding a \
             volatility ceiling keeps the rule out of choppy markets",
            perf.high_volatility_losses
        ),
        confidence: 0.5,
    })
}

/// Overtrading churns the portfolio; a longer cooldown thins the signal.
fn lengthen_cooldown(rule: &Rule, perf: &RulePerformance) -> Option<OptimizationCandidate> {
    if perf.trades_per_day <= 10.0 {
        return None;
    }
    let mut variant = variant_of(rule, "slow-down", "longer cooldown");
    let current = rule.cooldown_secs().unwrap_or(3600);
    let risk = variant
        .risk
        .get_or_insert_with(crate::domain::rule::RiskSpec::empty);
    risk.cooldown_secs = Some(current * 2);

    Some(OptimizationCandidate {
        rule: variant,
        projected: ProjectedMetrics {
            sharpe: perf.avg_sharpe + 0.1,
            win_rate: perf.win_rate,
            max_drawdown: perf.max_drawdown,
        },
        reasoning: format!(
            "{:.1} trades/day is overtrading; doubling the cooldown to {}s \
             halves signal frequency",
            perf.trades_per_day,
            current * 2
        ),
        confidence: 0.55,
    })
}

fn variant_of(rule: &Rule, id_suffix: &str, name_suffix: &str) -> Rule {
    let mut variant = rule.clone();
    variant.id = format!("{}-{}", rule.id, id_suffix);
    variant.name = format!("{} ({})", rule.name, name_suffix);
    variant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{Action, RiskSpec, Trigger};
    use approx::assert_relative_eq;

    fn rsi_rule() -> Rule {
        let mut risk = RiskSpec::empty();
        risk.cooldown_secs = Some(4 * 3600);
        Rule {
            id: "rsi-oversold".into(),
            name: "RSI Oversold".into(),
            enabled: true,
            trigger: Trigger {
                interval_minutes: 15,
            },
            conditions: vec![Condition::Indicator {
                indicator: IndicatorKind::Rsi,
                symbol: "BTC".into(),
                period: 14,
                lt: Some(30.0),
                gt: None,
            }],
            actions: vec![Action::Enter {
                symbol: "BTC".into(),
                allocation_pct: 10.0,
            }],
            risk: Some(risk),
        }
    }

    fn weak_perf() -> RulePerformance {
        RulePerformance {
            avg_sharpe: 0.3,
            max_drawdown: 0.1,
            win_rate: 0.65,
            trade_count: 40,
            total_pnl: -120.0,
            sample_periods: 8,
            high_volatility_losses: 0,
            trades_per_day: 2.0,
        }
    }

    #[test]
    fn score_weights_components() {
        let cfg = OptimizerConfig::default();
        let perfect = RulePerformance {
            avg_sharpe: 3.0,
            max_drawdown: 0.0,
            win_rate: 1.0,
            ..weak_perf()
        };
        assert_relative_eq!(composite_score(&perfect, &cfg), 1.0);

        let hopeless = RulePerformance {
            avg_sharpe: -1.0,
            max_drawdown: 0.5,
            win_rate: 0.0,
            ..weak_perf()
        };
        assert_relative_eq!(composite_score(&hopeless, &cfg), 0.0);
    }

    #[test]
    fn sharpe_clamps_at_three() {
        let cfg = OptimizerConfig::default();
        let a = RulePerformance {
            avg_sharpe: 3.0,
            ..weak_perf()
        };
        let b = RulePerformance {
            avg_sharpe: 9.0,
            ..weak_perf()
        };
        assert_relative_eq!(composite_score(&a, &cfg), composite_score(&b, &cfg));
    }

    #[test]
    fn small_sample_yields_no_candidates() {
        let perf = RulePerformance {
            sample_periods: 2,
            ..weak_perf()
        };
        assert!(propose_candidates(&rsi_rule(), &perf, &OptimizerConfig::default()).is_empty());
    }

    #[test]
    fn healthy_rule_is_left_alone() {
        let perf = RulePerformance {
            avg_sharpe: 2.5,
            max_drawdown: 0.05,
            win_rate: 0.7,
            ..weak_perf()
        };
        assert!(propose_candidates(&rsi_rule(), &perf, &OptimizerConfig::default()).is_empty());
    }

    #[test]
    fn winning_but_weak_rule_gets_tighter_rsi() {
        // High win rate, poor overall score: the RSI mutation should fire.
        let candidates =
            propose_candidates(&rsi_rule(), &weak_perf(), &OptimizerConfig::default());
        let tightened = candidates
            .iter()
            .find(|c| c.rule.id == "rsi-oversold-tight-rsi")
            .expect("expected a tightened-RSI candidate");

        match &tightened.rule.conditions[0] {
            Condition::Indicator { lt: Some(lt), .. } => assert_relative_eq!(*lt, 25.0),
            other => panic!("unexpected condition: {other:?}"),
        }
        assert!(tightened.confidence > 0.0 && tightened.confidence <= 1.0);
        assert!(!tightened.reasoning.is_empty());
    }

    #[test]
    fn tightened_rsi_floor_is_twenty() {
        let mut rule = rsi_rule();
        rule.conditions = vec![Condition::Indicator {
            indicator: IndicatorKind::Rsi,
            symbol: "BTC".into(),
            period: 14,
            lt: Some(22.0),
            gt: None,
        }];
        let candidates = propose_candidates(&rule, &weak_perf(), &OptimizerConfig::default());
        let tightened = candidates
            .iter()
            .find(|c| c.rule.id.ends_with("tight-rsi"))
            .expect("expected a tightened-RSI candidate");
        match &tightened.rule.conditions[0] {
            Condition::Indicator { lt: Some(lt), .. } => assert_relative_eq!(*lt, 20.0),
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn deep_drawdown_halves_allocations() {
        let perf = RulePerformance {
            max_drawdown: 0.3,
            win_rate: 0.4,
            ..weak_perf()
        };
        let candidates = propose_candidates(&rsi_rule(), &perf, &OptimizerConfig::default());
        let halved = candidates
            .iter()
            .find(|c| c.rule.id.ends_with("half-size"))
            .expect("expected a half-size candidate");
        assert!(matches!(
            halved.rule.actions[0],
            Action::Enter { allocation_pct, .. } if (allocation_pct - 5.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn volatility_losses_add_a_filter() {
        let perf = RulePerformance {
            win_rate: 0.3,
            high_volatility_losses: 8,
            ..weak_perf()
        };
        let candidates = propose_candidates(&rsi_rule(), &perf, &OptimizerConfig::default());
        let filtered = candidates
            .iter()
            .find(|c| c.rule.id.ends_with("vol-filter"))
            .expect("expected a volatility-filter candidate");
        assert_eq!(filtered.rule.conditions.len(), 2);
        assert!(matches!(
            filtered.rule.conditions[1],
            Condition::Indicator {
                indicator: IndicatorKind::Volatility,
                ..
            }
        ));
    }

    #[test]
    fn overtrading_doubles_cooldown() {
        let perf = RulePerformance {
            win_rate: 0.3,
            trades_per_day: 14.0,
            ..weak_perf()
        };
        let candidates = propose_candidates(&rsi_rule(), &perf, &OptimizerConfig::default());
        let slowed = candidates
            .iter()
            .find(|c| c.rule.id.ends_with("slow-down"))
            .expect("expected a longer-cooldown candidate");
        assert_eq!(slowed.rule.cooldown_secs(), Some(8 * 3600));
    }

    #[test]
    fn each_candidate_applies_one_mutation() {
        let perf = RulePerformance {
            win_rate: 0.65,
            max_drawdown: 0.3,
            high_volatility_losses: 8,
            trades_per_day: 14.0,
            ..weak_perf()
        };
        let candidates = propose_candidates(&rsi_rule(), &perf, &OptimizerConfig::default());
        assert_eq!(candidates.len(), 4);
        // The half-size candidate keeps the original RSI bound.
        let halved = candidates
            .iter()
            .find(|c| c.rule.id.ends_with("half-size"))
            .unwrap();
        assert!(matches!(
            halved.rule.conditions[0],
            Condition::Indicator { lt: Some(lt), .. } if (lt - 30.0).abs() < f64::EPSILON
        ));
    }
}
