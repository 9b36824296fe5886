//! Domain error types.

/// Top-level error type for tradewarden.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("invalid rule document: {field}: {reason}")]
    RuleParse { field: String, reason: String },

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient price history for {symbol}: have {points} points, need {minimum}")]
    InsufficientData {
        symbol: String,
        points: usize,
        minimum: usize,
    },

    #[error("backtest failed for rule {rule_id}: {reason}")]
    Backtest { rule_id: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WardenError {
    /// Parser helper: fail-fast error naming the offending field.
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        WardenError::RuleParse {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<&WardenError> for std::process::ExitCode {
    fn from(err: &WardenError) -> Self {
        let code: u8 = match err {
            WardenError::Io(_) => 1,
            WardenError::ConfigParse { .. }
            | WardenError::ConfigMissing { .. }
            | WardenError::ConfigInvalid { .. } => 2,
            WardenError::RuleParse { .. } | WardenError::RuleInvalid { .. } => 3,
            WardenError::NoData { .. } | WardenError::InsufficientData { .. } => 4,
            WardenError::Backtest { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_parse_names_field() {
        let err = WardenError::field("trigger.intervalMinutes", "expected positive integer");
        let msg = err.to_string();
        assert!(msg.contains("trigger.intervalMinutes"));
        assert!(msg.contains("positive integer"));
    }

    #[test]
    fn config_errors_name_section_and_key() {
        let err = WardenError::ConfigMissing {
            section: "backtest".into(),
            key: "start".into(),
        };
        assert_eq!(err.to_string(), "missing config key [backtest] start");
    }
}
