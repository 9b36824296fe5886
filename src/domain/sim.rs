//! Simulated portfolio for offline replay.
//!
//! Cash in the numeraire plus per-symbol quantities, with an open-lot ledger
//! so exits realize P&L against matched entries (FIFO: oldest open lot
//! first). No fees or slippage; the live system has no fee model either.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

/// One executed fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub at: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    /// Realized P&L for sells, matched against open lots. None for buys.
    pub realized_pnl: Option<f64>,
}

/// An entry-exit pair produced by lot matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedRound {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_at: DateTime<Utc>,
    pub exit_at: DateTime<Utc>,
    pub pnl: f64,
}

#[derive(Debug, Clone)]
struct Lot {
    quantity: f64,
    price: f64,
    at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SimPortfolio {
    pub cash: f64,
    pub numeraire: String,
    pub holdings: HashMap<String, f64>,
    pub trades: Vec<TradeRecord>,
    pub closed_rounds: Vec<ClosedRound>,
    open_lots: HashMap<String, VecDeque<Lot>>,
}

impl SimPortfolio {
    pub fn new(initial_cash: f64, numeraire: impl Into<String>) -> Self {
        SimPortfolio {
            cash: initial_cash,
            numeraire: numeraire.into(),
            holdings: HashMap::new(),
            trades: Vec::new(),
            closed_rounds: Vec::new(),
            open_lots: HashMap::new(),
        }
    }

    pub fn holding(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }

    /// Cash plus the value of every priced holding.
    pub fn total_equity(&self, prices: &HashMap<String, f64>) -> f64 {
        let held: f64 = self
            .holdings
            .iter()
            .filter_map(|(symbol, qty)| prices.get(symbol).map(|price| qty * price))
            .sum();
        self.cash + held
    }

    /// Convert `spend` of cash into `symbol` at `price`. Spend is clamped to
    /// available cash; a spend that rounds to nothing is a no-op.
    pub fn buy(&mut self, symbol: &str, spend: f64, price: f64, at: DateTime<Utc>) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        let spend = spend.min(self.cash).max(0.0);
        let quantity = spend / price;
        if quantity <= 0.0 {
            return 0.0;
        }

        self.cash -= spend;
        *self.holdings.entry(symbol.to_string()).or_insert(0.0) += quantity;
        self.open_lots
            .entry(symbol.to_string())
            .or_default()
            .push_back(Lot {
                quantity,
                price,
                at,
            });
        self.trades.push(TradeRecord {
            at,
            symbol: symbol.to_string(),
            side: Side::Buy,
            price,
            quantity,
            realized_pnl: None,
        });
        quantity
    }

    /// Sell `quantity` of `symbol` at `price`, clamped to the holding.
    /// Returns realized P&L from matching the sale against open lots.
    pub fn sell(&mut self, symbol: &str, quantity: f64, price: f64, at: DateTime<Utc>) -> f64 {
        let held = self.holding(symbol);
        let quantity = quantity.min(held).max(0.0);
        if quantity <= 0.0 || price <= 0.0 {
            return 0.0;
        }

        self.cash += quantity * price;
        if let Some(balance) = self.holdings.get_mut(symbol) {
            *balance -= quantity;
            if *balance <= 0.0 {
                self.holdings.remove(symbol);
            }
        }

        let pnl = self.match_lots(symbol, quantity, price, at);
        self.trades.push(TradeRecord {
            at,
            symbol: symbol.to_string(),
            side: Side::Sell,
            price,
            quantity,
            realized_pnl: Some(pnl),
        });
        pnl
    }

    fn match_lots(&mut self, symbol: &str, quantity: f64, price: f64, at: DateTime<Utc>) -> f64 {
        let Some(lots) = self.open_lots.get_mut(symbol) else {
            return 0.0;
        };

        let mut remaining = quantity;
        let mut pnl = 0.0;
        while remaining > 0.0 {
            let Some(lot) = lots.front_mut() else {
                break;
            };
            let matched = remaining.min(lot.quantity);
            let round_pnl = (price - lot.price) * matched;
            pnl += round_pnl;
            self.closed_rounds.push(ClosedRound {
                symbol: symbol.to_string(),
                quantity: matched,
                entry_price: lot.price,
                exit_price: price,
                entry_at: lot.at,
                exit_at: at,
                pnl: round_pnl,
            });

            lot.quantity -= matched;
            remaining -= matched;
            if lot.quantity <= 1e-12 {
                lots.pop_front();
            }
        }
        pnl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::minutes(min)
    }

    #[test]
    fn buy_converts_cash_to_holding() {
        let mut sim = SimPortfolio::new(10_000.0, "USD");
        let qty = sim.buy("BTC", 1_000.0, 50_000.0, t(0));
        assert_relative_eq!(qty, 0.02);
        assert_relative_eq!(sim.cash, 9_000.0);
        assert_relative_eq!(sim.holding("BTC"), 0.02);
        assert_eq!(sim.trades.len(), 1);
        assert_eq!(sim.trades[0].side, Side::Buy);
    }

    #[test]
    fn buy_clamps_to_available_cash() {
        let mut sim = SimPortfolio::new(500.0, "USD");
        sim.buy("BTC", 1_000.0, 50_000.0, t(0));
        assert_relative_eq!(sim.cash, 0.0);
        assert_relative_eq!(sim.holding("BTC"), 0.01);
    }

    #[test]
    fn sell_realizes_fifo_pnl() {
        let mut sim = SimPortfolio::new(10_000.0, "USD");
        sim.buy("BTC", 1_000.0, 50_000.0, t(0)); // 0.02 @ 50k
        sim.buy("BTC", 1_200.0, 60_000.0, t(15)); // 0.02 @ 60k

        // Sell 0.03: 0.02 from the first lot (+10k/unit), 0.01 from the second (0).
        let pnl = sim.sell("BTC", 0.03, 60_000.0, t(30));
        assert_relative_eq!(pnl, 0.02 * 10_000.0, epsilon = 1e-9);
        assert_eq!(sim.closed_rounds.len(), 2);
        assert_relative_eq!(sim.closed_rounds[0].pnl, 200.0, epsilon = 1e-9);
        assert_relative_eq!(sim.closed_rounds[1].pnl, 0.0, epsilon = 1e-9);
        assert_eq!(sim.closed_rounds[0].entry_at, t(0));
        assert_eq!(sim.closed_rounds[0].exit_at, t(30));
        assert_relative_eq!(sim.holding("BTC"), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn sell_clamps_to_holding() {
        let mut sim = SimPortfolio::new(10_000.0, "USD");
        sim.buy("BTC", 1_000.0, 50_000.0, t(0));
        let pnl = sim.sell("BTC", 1.0, 55_000.0, t(10));
        // Only 0.02 was held.
        assert_relative_eq!(pnl, 0.02 * 5_000.0, epsilon = 1e-9);
        assert_relative_eq!(sim.holding("BTC"), 0.0);
    }

    #[test]
    fn sell_of_unheld_symbol_is_noop() {
        let mut sim = SimPortfolio::new(10_000.0, "USD");
        assert_eq!(sim.sell("BTC", 1.0, 50_000.0, t(0)), 0.0);
        assert!(sim.trades.is_empty());
        assert_relative_eq!(sim.cash, 10_000.0);
    }

    #[test]
    fn total_equity_tracks_prices() {
        let mut sim = SimPortfolio::new(10_000.0, "USD");
        sim.buy("BTC", 5_000.0, 50_000.0, t(0)); // 0.1 BTC
        let prices = HashMap::from([("BTC".to_string(), 60_000.0)]);
        assert_relative_eq!(sim.total_equity(&prices), 5_000.0 + 6_000.0);
    }

    #[test]
    fn round_trip_preserves_equity_at_constant_price() {
        let mut sim = SimPortfolio::new(10_000.0, "USD");
        sim.buy("BTC", 4_000.0, 40_000.0, t(0));
        sim.sell("BTC", sim.holding("BTC"), 40_000.0, t(60));
        assert_relative_eq!(sim.cash, 10_000.0, epsilon = 1e-9);
        assert_relative_eq!(sim.closed_rounds[0].pnl, 0.0, epsilon = 1e-9);
    }
}
