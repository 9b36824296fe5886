//! JSON rule file adapter.

use std::fs;
use std::path::PathBuf;

use crate::domain::error::WardenError;
use crate::domain::rule::Rule;
use crate::domain::rule_parser::parse_rules;
use crate::ports::rule_port::RulePort;

pub struct JsonRuleAdapter {
    path: PathBuf,
}

impl JsonRuleAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RulePort for JsonRuleAdapter {
    fn load_rules(&self) -> Result<Vec<Rule>, WardenError> {
        let content = fs::read_to_string(&self.path)?;
        let doc: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| WardenError::RuleParse {
                field: "$".into(),
                reason: format!("not valid JSON: {e}"),
            })?;
        parse_rules(&doc)
    }
}
