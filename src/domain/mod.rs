//! Core domain types and logic.

pub mod error;
pub mod rule;
pub mod rule_parser;
pub mod context;
pub mod intent;
pub mod indicator;
pub mod risk;
pub mod evaluator;
pub mod sim;
pub mod metrics;
pub mod backtest;
pub mod optimizer;
pub mod settings;
