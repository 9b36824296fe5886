//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_price_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::json_rule_adapter::JsonRuleAdapter;
use crate::domain::backtest::{
    run_batch, HistoricalPath, PricePath, RandomWalkPath,
};
use crate::domain::context::PriceSeries;
use crate::domain::error::WardenError;
use crate::domain::optimizer::{composite_score, propose_candidates, RulePerformance};
use crate::domain::rule::{Action, Condition, Rule};
use crate::domain::settings::{
    backtest_config_from, engine_config_from, optimizer_config_from,
};
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;
use crate::ports::rule_port::RulePort;

#[derive(Parser, Debug)]
#[command(name = "tradewarden", about = "Rule-based trading-signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a rule file
    Validate {
        #[arg(short, long)]
        rules: PathBuf,
    },
    /// Backtest rules over historical or synthetic prices
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        rules: PathBuf,
        /// Directory of {SYMBOL}.csv price files; omit for a synthetic walk
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Overrides the seed from the config file
        #[arg(long)]
        seed: Option<u64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Propose mutated variants of underperforming rules
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        rules: PathBuf,
        /// JSON file of per-rule performance, keyed by rule id
        #[arg(short, long)]
        metrics: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate { rules } => run_validate(&rules),
        Command::Backtest {
            config,
            rules,
            data,
            seed,
            output,
        } => run_backtest(&config, &rules, data.as_ref(), seed, output.as_ref()),
        Command::Optimize {
            config,
            rules,
            metrics,
            output,
        } => run_optimize(&config, &rules, &metrics, output.as_ref()),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = WardenError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn load_rules(path: &PathBuf) -> Result<Vec<Rule>, ExitCode> {
    JsonRuleAdapter::new(path.clone()).load_rules().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_validate(rules_path: &PathBuf) -> ExitCode {
    eprintln!("Validating rules from {}", rules_path.display());
    let rules = match load_rules(rules_path) {
        Ok(r) => r,
        Err(code) => return code,
    };
    for rule in &rules {
        let state = if rule.enabled { "enabled" } else { "disabled" };
        eprintln!(
            "  {} ({state}): {} condition(s), {} action(s)",
            rule.name,
            rule.conditions.len(),
            rule.actions.len()
        );
    }
    eprintln!("OK: {} rule(s) valid", rules.len());
    ExitCode::SUCCESS
}

fn run_backtest(
    config_path: &PathBuf,
    rules_path: &PathBuf,
    data_path: Option<&PathBuf>,
    seed_override: Option<u64>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let mut bt = match backtest_config_from(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if seed_override.is_some() {
        bt.seed = seed_override;
    }
    let engine = match engine_config_from(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Loading rules from {}", rules_path.display());
    let rules = match load_rules(rules_path) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let symbols = referenced_symbols(&rules);
    if symbols.is_empty() {
        eprintln!("error: rules reference no symbols");
        return ExitCode::from(3);
    }

    // Each rule replays against a fresh copy of the same path so results
    // never depend on rule order.
    let make_path: Box<dyn FnMut() -> Box<dyn PricePath>> = match data_path {
        Some(dir) => {
            eprintln!("Loading price data from {}", dir.display());
            let prices = CsvPriceAdapter::new(dir.clone());
            let mut series: HashMap<String, PriceSeries> = HashMap::new();
            for symbol in &symbols {
                match prices.fetch_prices(symbol, bt.start, bt.end) {
                    Ok(s) if s.is_empty() => {
                        let err = WardenError::NoData {
                            symbol: symbol.clone(),
                        };
                        eprintln!("error: {err}");
                        return (&err).into();
                    }
                    Ok(s) => {
                        series.insert(symbol.clone(), s);
                    }
                    Err(e) => {
                        eprintln!("error: {e}");
                        return (&e).into();
                    }
                }
            }
            Box::new(move || Box::new(HistoricalPath::new(series.clone())))
        }
        None => {
            eprintln!(
                "No data directory given; using a synthetic walk (seed: {})",
                bt.seed.map_or("entropy".to_string(), |s| s.to_string())
            );
            let initial: HashMap<String, f64> =
                symbols.iter().map(|s| (s.clone(), 100.0)).collect();
            let bt = bt.clone();
            Box::new(move || {
                Box::new(RandomWalkPath::new(
                    initial.clone(),
                    bt.walk_drift,
                    bt.walk_volatility,
                    bt.seed,
                ))
            })
        }
    };

    eprintln!(
        "Backtesting {} rule(s) from {} to {}",
        rules.len(),
        bt.start.format("%Y-%m-%d"),
        bt.end.format("%Y-%m-%d")
    );
    let results = run_batch(&rules, &bt, &engine, make_path, None);

    for result in &results {
        eprintln!(
            "  {}: return {:+.2}%, sharpe {:.2}, max drawdown {:.1}%, {} trade(s)",
            result.rule_id,
            result.metrics.total_return_pct,
            result.metrics.sharpe_ratio,
            result.metrics.max_drawdown * 100.0,
            result.metrics.total_trades
        );
    }

    if let Some(path) = output_path {
        if let Err(e) = JsonReportAdapter.write_backtests(&results, path) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Report written to {}", path.display());
    }
    ExitCode::SUCCESS
}

fn run_optimize(
    config_path: &PathBuf,
    rules_path: &PathBuf,
    metrics_path: &PathBuf,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let cfg = match optimizer_config_from(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let rules = match load_rules(rules_path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    eprintln!("Loading performance metrics from {}", metrics_path.display());
    let performance: HashMap<String, RulePerformance> = match fs::read_to_string(metrics_path)
        .map_err(WardenError::from)
        .and_then(|content| {
            serde_json::from_str(&content).map_err(|e| WardenError::RuleInvalid {
                reason: format!("performance file is not valid: {e}"),
            })
        }) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let mut all_candidates = Vec::new();
    for rule in &rules {
        let Some(perf) = performance.get(&rule.id) else {
            eprintln!("  {}: no performance data, skipping", rule.id);
            continue;
        };
        let score = composite_score(perf, &cfg);
        let candidates = propose_candidates(rule, perf, &cfg);
        eprintln!(
            "  {}: score {:.2}, {} candidate(s)",
            rule.id,
            score,
            candidates.len()
        );
        for candidate in &candidates {
            eprintln!(
                "    {} (confidence {:.0}%): {}",
                candidate.rule.name,
                candidate.confidence * 100.0,
                candidate.reasoning
            );
        }
        all_candidates.extend(candidates);
    }

    if let Some(path) = output_path {
        if let Err(e) = JsonReportAdapter.write_candidates(&all_candidates, path) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Candidates written to {}", path.display());
    }
    ExitCode::SUCCESS
}

/// Every symbol a rule set touches, for price-path construction.
fn referenced_symbols(rules: &[Rule]) -> BTreeSet<String> {
    let mut symbols = BTreeSet::new();
    for rule in rules {
        for condition in &rule.conditions {
            match condition {
                Condition::Indicator { symbol, .. }
                | Condition::PriceChange { symbol, .. }
                | Condition::PortfolioExposure { symbol, .. } => {
                    symbols.insert(symbol.clone());
                }
            }
        }
        for action in &rule.actions {
            match action {
                Action::Enter { symbol, .. } | Action::Exit { symbol, .. } => {
                    symbols.insert(symbol.clone());
                }
                Action::Rebalance { target } => {
                    symbols.extend(target.keys().cloned());
                }
            }
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{RiskSpec, Trigger};
    use std::collections::BTreeMap;

    #[test]
    fn referenced_symbols_covers_conditions_and_actions() {
        let rule = Rule {
            id: "r".into(),
            name: "r".into(),
            enabled: true,
            trigger: Trigger {
                interval_minutes: 15,
            },
            conditions: vec![Condition::PriceChange {
                symbol: "ETH".into(),
                window_minutes: 60,
                lt: Some(-2.0),
                gt: None,
            }],
            actions: vec![
                Action::Enter {
                    symbol: "BTC".into(),
                    allocation_pct: 10.0,
                },
                Action::Rebalance {
                    target: BTreeMap::from([("SOL".to_string(), 50.0)]),
                },
            ],
            risk: Some(RiskSpec::empty()),
        };
        let symbols = referenced_symbols(std::slice::from_ref(&rule));
        assert_eq!(
            symbols.into_iter().collect::<Vec<_>>(),
            vec!["BTC", "ETH", "SOL"]
        );
    }
}
