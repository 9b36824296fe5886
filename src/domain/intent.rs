//! Trade intents.
//!
//! An intent is a proposed trade pending approval or auto-execution. Produced
//! fresh each tick, never mutated, and without an independent lifecycle: the
//! caller either persists it (approval queue or execution record) or drops it.

use crate::domain::rule::Action;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub rule_id: String,
    pub action: Action,
    /// False only when the symbol is a core asset, auto-execution is enabled,
    /// and the risk layer allowed the intent.
    pub requires_approval: bool,
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_carries_action() {
        let intent = Intent {
            rule_id: "r1".into(),
            action: Action::Enter {
                symbol: "BTC".into(),
                allocation_pct: 10.0,
            },
            requires_approval: true,
            dry_run: false,
        };
        assert_eq!(intent.action.symbol(), Some("BTC"));
        assert!(intent.requires_approval);
    }
}
