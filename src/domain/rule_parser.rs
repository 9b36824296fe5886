//! Rule document parsing and validation.
//!
//! Rules arrive as JSON. Parsing is an explicit walk of the document rather
//! than a derive: every error names the offending field path
//! (`conditions[2].symbol`) and the validator rejects unknown condition and
//! action shapes outright, so a typo in a rule file cannot silently produce a
//! rule that never fires.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::error::WardenError;
use crate::domain::rule::{Action, Condition, Guardrail, IndicatorKind, RiskSpec, Rule, Trigger};

/// Parse a JSON array of rule documents, failing on the first invalid one.
pub fn parse_rules(doc: &Value) -> Result<Vec<Rule>, WardenError> {
    let entries = doc
        .as_array()
        .ok_or_else(|| WardenError::field("$", "expected a JSON array of rules"))?;
    entries.iter().map(parse_rule).collect()
}

pub fn parse_rule(doc: &Value) -> Result<Rule, WardenError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| WardenError::field("$", "expected a rule object"))?;

    let name = require_str(doc, "name")?;
    let id = match obj.get("id") {
        Some(_) => require_str(doc, "id")?,
        None => name.clone(),
    };
    let enabled = optional_bool(doc, "enabled")?.unwrap_or(true);

    let trigger_doc = obj
        .get("trigger")
        .ok_or_else(|| WardenError::field("trigger", "missing required field"))?;
    let trigger = parse_trigger(trigger_doc)?;

    let conditions_doc = obj
        .get("conditions")
        .ok_or_else(|| WardenError::field("conditions", "missing required field"))?;
    let conditions = conditions_doc
        .as_array()
        .ok_or_else(|| WardenError::field("conditions", "expected an array"))?
        .iter()
        .enumerate()
        .map(|(i, c)| parse_condition(c, &format!("conditions[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let actions_doc = obj
        .get("actions")
        .ok_or_else(|| WardenError::field("actions", "missing required field"))?;
    let actions = actions_doc
        .as_array()
        .ok_or_else(|| WardenError::field("actions", "expected an array"))?
        .iter()
        .enumerate()
        .map(|(i, a)| parse_action(a, &format!("actions[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;
    if actions.is_empty() {
        return Err(WardenError::field("actions", "must not be empty"));
    }

    let risk = match obj.get("risk") {
        Some(Value::Null) | None => None,
        Some(risk_doc) => Some(parse_risk(risk_doc)?),
    };

    Ok(Rule {
        id,
        name,
        enabled,
        trigger,
        conditions,
        actions,
        risk,
    })
}

fn parse_trigger(doc: &Value) -> Result<Trigger, WardenError> {
    let interval = require_u64(doc, "trigger.intervalMinutes", "intervalMinutes")?;
    if interval == 0 || interval > u32::MAX as u64 {
        return Err(WardenError::field(
            "trigger.intervalMinutes",
            format!("expected positive 32-bit integer, got {interval}"),
        ));
    }
    Ok(Trigger {
        interval_minutes: interval as u32,
    })
}

fn parse_condition(doc: &Value, path: &str) -> Result<Condition, WardenError> {
    let kind = require_str_at(doc, path, "type")?;
    match kind.as_str() {
        "indicator" => {
            let indicator = match require_str_at(doc, path, "indicator")?.as_str() {
                "rsi" => IndicatorKind::Rsi,
                "sma" => IndicatorKind::Sma,
                "volatility" => IndicatorKind::Volatility,
                other => {
                    return Err(WardenError::field(
                        format!("{path}.indicator"),
                        format!("unknown indicator '{other}'"),
                    ));
                }
            };
            let period = require_u64_at(doc, path, "period")?;
            if period == 0 {
                return Err(WardenError::field(
                    format!("{path}.period"),
                    "must be positive",
                ));
            }
            let lt = optional_f64_at(doc, path, "lt")?;
            let gt = optional_f64_at(doc, path, "gt")?;
            if lt.is_none() && gt.is_none() {
                return Err(WardenError::field(
                    path,
                    "indicator condition needs at least one of lt/gt",
                ));
            }
            Ok(Condition::Indicator {
                indicator,
                symbol: require_str_at(doc, path, "symbol")?,
                period: period as usize,
                lt,
                gt,
            })
        }
        "priceChange" => {
            let window = require_u64_at(doc, path, "windowMinutes")?;
            if window == 0 || window > u32::MAX as u64 {
                return Err(WardenError::field(
                    format!("{path}.windowMinutes"),
                    "expected positive 32-bit integer",
                ));
            }
            let lt = optional_f64_at(doc, path, "lt")?;
            let gt = optional_f64_at(doc, path, "gt")?;
            if lt.is_none() && gt.is_none() {
                return Err(WardenError::field(
                    path,
                    "priceChange condition needs at least one of lt/gt",
                ));
            }
            Ok(Condition::PriceChange {
                symbol: require_str_at(doc, path, "symbol")?,
                window_minutes: window as u32,
                lt,
                gt,
            })
        }
        "portfolioExposure" => Ok(Condition::PortfolioExposure {
            symbol: require_str_at(doc, path, "symbol")?,
            lt_pct: require_f64_at(doc, path, "ltPct")?,
        }),
        other => Err(WardenError::field(
            format!("{path}.type"),
            format!("unknown condition type '{other}'"),
        )),
    }
}

fn parse_action(doc: &Value, path: &str) -> Result<Action, WardenError> {
    let kind = require_str_at(doc, path, "type")?;
    match kind.as_str() {
        "enter" => Ok(Action::Enter {
            symbol: require_str_at(doc, path, "symbol")?,
            allocation_pct: require_f64_at(doc, path, "allocationPct")?,
        }),
        // Exit without a size means "close the position".
        "exit" => Ok(Action::Exit {
            symbol: require_str_at(doc, path, "symbol")?,
            allocation_pct: optional_f64_at(doc, path, "allocationPct")?.unwrap_or(100.0),
        }),
        "rebalance" => {
            let target_doc = doc
                .get("target")
                .ok_or_else(|| WardenError::field(format!("{path}.target"), "missing required field"))?;
            let entries = target_doc.as_object().ok_or_else(|| {
                WardenError::field(format!("{path}.target"), "expected an object of symbol weights")
            })?;
            if entries.is_empty() {
                return Err(WardenError::field(
                    format!("{path}.target"),
                    "must not be empty",
                ));
            }
            let mut target = BTreeMap::new();
            for (symbol, weight) in entries {
                let weight = weight.as_f64().ok_or_else(|| {
                    WardenError::field(
                        format!("{path}.target.{symbol}"),
                        "expected a number",
                    )
                })?;
                if !(0.0..=100.0).contains(&weight) {
                    return Err(WardenError::field(
                        format!("{path}.target.{symbol}"),
                        format!("weight must be in 0..=100, got {weight}"),
                    ));
                }
                target.insert(symbol.clone(), weight);
            }
            Ok(Action::Rebalance { target })
        }
        other => Err(WardenError::field(
            format!("{path}.type"),
            format!("unknown action type '{other}'"),
        )),
    }
}

fn parse_risk(doc: &Value) -> Result<RiskSpec, WardenError> {
    if !doc.is_object() {
        return Err(WardenError::field("risk", "expected an object"));
    }

    let mut risk = RiskSpec::empty();
    risk.max_position_pct = optional_f64_at(doc, "risk", "maxPositionPct")?;
    if let Some(pct) = risk.max_position_pct {
        if !(0.0..=100.0).contains(&pct) {
            return Err(WardenError::field(
                "risk.maxPositionPct",
                format!("must be in 0..=100, got {pct}"),
            ));
        }
    }
    risk.cooldown_secs = match doc.get("cooldownSecs") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_u64().ok_or_else(|| {
            WardenError::field("risk.cooldownSecs", "expected non-negative integer")
        })?),
    };
    risk.max_daily_loss_pct = optional_f64_at(doc, "risk", "maxDailyLossPct")?;
    if let Some(pct) = risk.max_daily_loss_pct {
        if pct <= 0.0 {
            return Err(WardenError::field(
                "risk.maxDailyLossPct",
                format!("must be positive, got {pct}"),
            ));
        }
    }

    if let Some(tags) = doc.get("guardrails") {
        let tags = tags
            .as_array()
            .ok_or_else(|| WardenError::field("risk.guardrails", "expected an array of tags"))?;
        for (i, tag) in tags.iter().enumerate() {
            let tag = tag.as_str().ok_or_else(|| {
                WardenError::field(format!("risk.guardrails[{i}]"), "expected a string")
            })?;
            let guardrail = Guardrail::from_tag(tag).ok_or_else(|| {
                WardenError::field(
                    format!("risk.guardrails[{i}]"),
                    format!("unknown guardrail '{tag}'"),
                )
            })?;
            risk.guardrails.insert(guardrail);
        }
    }

    Ok(risk)
}

fn require_str(doc: &Value, key: &str) -> Result<String, WardenError> {
    doc.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WardenError::field(key, "expected a string"))
}

fn require_str_at(doc: &Value, path: &str, key: &str) -> Result<String, WardenError> {
    doc.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WardenError::field(format!("{path}.{key}"), "expected a string"))
}

fn require_u64(doc: &Value, field: &str, key: &str) -> Result<u64, WardenError> {
    doc.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| WardenError::field(field, "expected a non-negative integer"))
}

fn require_u64_at(doc: &Value, path: &str, key: &str) -> Result<u64, WardenError> {
    doc.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            WardenError::field(format!("{path}.{key}"), "expected a non-negative integer")
        })
}

fn require_f64_at(doc: &Value, path: &str, key: &str) -> Result<f64, WardenError> {
    doc.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| WardenError::field(format!("{path}.{key}"), "expected a number"))
}

fn optional_f64_at(doc: &Value, path: &str, key: &str) -> Result<Option<f64>, WardenError> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            WardenError::field(format!("{path}.{key}"), "expected a number")
        }),
    }
}

fn optional_bool(doc: &Value, key: &str) -> Result<Option<bool>, WardenError> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| WardenError::field(key, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn oversold_doc() -> Value {
        json!({
            "id": "rsi-oversold",
            "name": "RSI Oversold",
            "enabled": true,
            "trigger": { "intervalMinutes": 15 },
            "conditions": [
                { "type": "indicator", "indicator": "rsi", "symbol": "BTC", "period": 14, "lt": 30 }
            ],
            "actions": [
                { "type": "enter", "symbol": "BTC", "allocationPct": 10 }
            ],
            "risk": {
                "cooldownSecs": 14400,
                "maxPositionPct": 40,
                "guardrails": ["baselineProtection"]
            }
        })
    }

    #[test]
    fn parses_full_rule() {
        let rule = parse_rule(&oversold_doc()).unwrap();
        assert_eq!(rule.id, "rsi-oversold");
        assert_eq!(rule.name, "RSI Oversold");
        assert!(rule.enabled);
        assert_eq!(rule.trigger.interval_minutes, 15);
        assert!(matches!(
            rule.conditions[0],
            Condition::Indicator {
                indicator: IndicatorKind::Rsi,
                period: 14,
                lt: Some(lt),
                gt: None,
                ..
            } if (lt - 30.0).abs() < f64::EPSILON
        ));
        assert!(matches!(
            rule.actions[0],
            Action::Enter { ref symbol, allocation_pct }
                if symbol == "BTC" && (allocation_pct - 10.0).abs() < f64::EPSILON
        ));
        assert_eq!(rule.cooldown_secs(), Some(14400));
        assert!(rule.has_guardrail(Guardrail::BaselineProtection));
    }

    #[test]
    fn id_defaults_to_name() {
        let mut doc = oversold_doc();
        doc.as_object_mut().unwrap().remove("id");
        let rule = parse_rule(&doc).unwrap();
        assert_eq!(rule.id, "RSI Oversold");
    }

    #[test]
    fn enabled_defaults_to_true() {
        let mut doc = oversold_doc();
        doc.as_object_mut().unwrap().remove("enabled");
        assert!(parse_rule(&doc).unwrap().enabled);
    }

    #[test]
    fn missing_name_names_the_field() {
        let mut doc = oversold_doc();
        doc.as_object_mut().unwrap().remove("name");
        let err = parse_rule(&doc).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn missing_trigger_is_rejected() {
        let mut doc = oversold_doc();
        doc.as_object_mut().unwrap().remove("trigger");
        let err = parse_rule(&doc).unwrap_err();
        assert!(err.to_string().contains("trigger"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut doc = oversold_doc();
        doc["trigger"]["intervalMinutes"] = json!(0);
        let err = parse_rule(&doc).unwrap_err();
        assert!(err.to_string().contains("trigger.intervalMinutes"));
    }

    #[test]
    fn empty_actions_are_rejected() {
        let mut doc = oversold_doc();
        doc["actions"] = json!([]);
        let err = parse_rule(&doc).unwrap_err();
        assert!(err.to_string().contains("actions"));
    }

    #[test]
    fn empty_conditions_are_allowed() {
        // Vacuously true: an unconditional rule still gated by trigger and risk.
        let mut doc = oversold_doc();
        doc["conditions"] = json!([]);
        assert!(parse_rule(&doc).unwrap().conditions.is_empty());
    }

    #[test]
    fn unknown_condition_type_is_rejected() {
        let mut doc = oversold_doc();
        doc["conditions"][0]["type"] = json!("astrology");
        let err = parse_rule(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("conditions[0].type"));
        assert!(msg.contains("astrology"));
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let mut doc = oversold_doc();
        doc["actions"][0]["type"] = json!("yolo");
        let err = parse_rule(&doc).unwrap_err();
        assert!(err.to_string().contains("actions[0].type"));
    }

    #[test]
    fn condition_without_bounds_is_rejected() {
        let mut doc = oversold_doc();
        doc["conditions"][0].as_object_mut().unwrap().remove("lt");
        let err = parse_rule(&doc).unwrap_err();
        assert!(err.to_string().contains("lt/gt"));
    }

    #[test]
    fn unknown_guardrail_is_rejected() {
        let mut doc = oversold_doc();
        doc["risk"]["guardrails"] = json!(["baselineProtection", "timeTravel"]);
        let err = parse_rule(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("risk.guardrails[1]"));
        assert!(msg.contains("timeTravel"));
    }

    #[test]
    fn exit_allocation_defaults_to_full() {
        let mut doc = oversold_doc();
        doc["actions"] = json!([{ "type": "exit", "symbol": "BTC" }]);
        let rule = parse_rule(&doc).unwrap();
        assert!(matches!(
            rule.actions[0],
            Action::Exit { allocation_pct, .. } if (allocation_pct - 100.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn rebalance_weights_validated() {
        let mut doc = oversold_doc();
        doc["actions"] = json!([{ "type": "rebalance", "target": { "BTC": 60, "ETH": 140 } }]);
        let err = parse_rule(&doc).unwrap_err();
        assert!(err.to_string().contains("target.ETH"));

        doc["actions"] = json!([{ "type": "rebalance", "target": { "BTC": 60, "ETH": 40 } }]);
        let rule = parse_rule(&doc).unwrap();
        assert!(matches!(rule.actions[0], Action::Rebalance { .. }));
    }

    #[test]
    fn parse_rules_walks_the_array() {
        let doc = json!([oversold_doc(), oversold_doc()]);
        assert_eq!(parse_rules(&doc).unwrap().len(), 2);

        let err = parse_rules(&json!({"not": "an array"})).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn serialized_rule_reparses_identically() {
        let rule = parse_rule(&oversold_doc()).unwrap();
        let doc = serde_json::to_value(&rule).unwrap();
        assert_eq!(parse_rule(&doc).unwrap(), rule);
    }
}
