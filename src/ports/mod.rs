//! Port traits the domain is written against.

pub mod config_port;
pub mod price_port;
pub mod report_port;
pub mod rule_port;
