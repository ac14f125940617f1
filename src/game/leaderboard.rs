//! Per-identity scores and the regional rollup.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{LeaderboardEntry, LeaderboardRow, RegionStanding, TradeDirection};

/// Leaderboard keyed by display name. Entries keep insertion order so ties
/// sort stably.
#[derive(Debug, Default)]
pub struct LeaderboardStore {
    entries: Vec<LeaderboardEntry>,
    index: HashMap<String, usize>,
}

impl LeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&LeaderboardEntry> {
        self.index.get(identity).map(|&i| &self.entries[i])
    }

    /// Apply a trade to an identity's standing, creating the entry on first use.
    ///
    /// `region` only matters the first time an identity trades.
    pub fn record_trade(
        &mut self,
        identity: &str,
        region: &str,
        direction: TradeDirection,
        volume: i64,
    ) -> LeaderboardEntry {
        let slot = match self.index.get(identity) {
            Some(&i) => i,
            None => {
                self.entries
                    .push(LeaderboardEntry::new(identity.to_string(), region.to_string()));
                let i = self.entries.len() - 1;
                self.index.insert(identity.to_string(), i);
                i
            }
        };

        let entry = &mut self.entries[slot];
        entry.apply(direction.signed(volume));
        entry.clone()
    }

    /// Highest scores first; equal scores keep first-trade order.
    pub fn top_n(&self, n: usize) -> Vec<LeaderboardRow> {
        let mut ranked: Vec<&LeaderboardEntry> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked.into_iter().take(n).map(LeaderboardRow::from).collect()
    }

    /// Scores grouped by region, highest total first.
    pub fn region_rollup(&self) -> Vec<RegionStanding> {
        let mut order: Vec<&str> = Vec::new();
        let mut totals: HashMap<&str, (i64, u32)> = HashMap::new();

        for entry in &self.entries {
            let slot = totals.entry(entry.region.as_str()).or_insert_with(|| {
                order.push(entry.region.as_str());
                (0, 0)
            });
            slot.0 = slot.0.saturating_add(entry.score);
            slot.1 = slot.1.saturating_add(1);
        }

        let mut standings: Vec<RegionStanding> = order
            .into_iter()
            .map(|region| {
                let (total_score, player_count) = totals[region];
                let avg_score = (Decimal::from(total_score) / Decimal::from(player_count.max(1)))
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                RegionStanding {
                    region: region.to_string(),
                    total_score,
                    player_count,
                    avg_score,
                }
            })
            .collect();

        standings.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lazy_creation_and_sticky_region() {
        let mut store = LeaderboardStore::new();
        assert!(store.get("dave").is_none());

        let entry = store.record_trade("dave", "TW", TradeDirection::Buy, 2);
        assert_eq!(entry.score, 2);
        assert_eq!(entry.region, "TW");

        // Reconnecting from elsewhere does not move the entry.
        let entry = store.record_trade("dave", "JP", TradeDirection::Buy, 1);
        assert_eq!(entry.region, "TW");
        assert_eq!(entry.trade_count, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_net_seller_scores_zero() {
        let mut store = LeaderboardStore::new();
        store.record_trade("erin", "US", TradeDirection::Buy, 1);
        store.record_trade("erin", "US", TradeDirection::Sell, 1);
        let entry = store.record_trade("erin", "US", TradeDirection::Sell, 1);

        assert_eq!(entry.score, 0);
        assert_eq!(entry.trade_count, 3);
    }

    #[test]
    fn test_top_n_is_stable() {
        let mut store = LeaderboardStore::new();
        store.record_trade("first", "A", TradeDirection::Buy, 5);
        store.record_trade("second", "A", TradeDirection::Buy, 9);
        store.record_trade("third", "B", TradeDirection::Buy, 5);
        store.record_trade("fourth", "B", TradeDirection::Buy, 1);

        let names: Vec<String> = store.top_n(10).into_iter().map(|r| r.username).collect();
        assert_eq!(names, vec!["second", "first", "third", "fourth"]);

        let top2: Vec<String> = store.top_n(2).into_iter().map(|r| r.username).collect();
        assert_eq!(top2, vec!["second", "first"]);
    }

    #[test]
    fn test_region_rollup() {
        let mut store = LeaderboardStore::new();
        store.record_trade("a", "TW", TradeDirection::Buy, 1);
        store.record_trade("b", "TW", TradeDirection::Buy, 2);
        store.record_trade("c", "TW", TradeDirection::Buy, 2);
        store.record_trade("d", "JP", TradeDirection::Buy, 10);
        store.record_trade("e", "unknown", TradeDirection::Sell, 4);

        let rollup = store.region_rollup();
        assert_eq!(rollup.len(), 3);

        assert_eq!(rollup[0].region, "JP");
        assert_eq!(rollup[0].total_score, 10);
        assert_eq!(rollup[0].avg_score, dec!(10));

        assert_eq!(rollup[1].region, "TW");
        assert_eq!(rollup[1].total_score, 5);
        assert_eq!(rollup[1].player_count, 3);
        assert_eq!(rollup[1].avg_score, dec!(1.67));

        assert_eq!(rollup[2].region, "unknown");
        assert_eq!(rollup[2].total_score, 0);
        assert_eq!(rollup[2].avg_score, dec!(0));
    }

    #[test]
    fn test_region_average_rounds_half_up() {
        let mut store = LeaderboardStore::new();
        for (name, score) in [("p1", 1), ("p2", 0), ("p3", 0), ("p4", 0), ("p5", 0), ("p6", 0), ("p7", 0), ("p8", 0)] {
            store.record_trade(name, "KR", TradeDirection::Buy, score);
        }

        // 1 / 8 = 0.125
        assert_eq!(store.region_rollup()[0].avg_score, dec!(0.13));
    }

    #[test]
    fn test_region_total_saturates() {
        let mut store = LeaderboardStore::new();
        store.record_trade("x", "TW", TradeDirection::Buy, i64::MAX);
        store.record_trade("y", "TW", TradeDirection::Buy, i64::MAX);
        store.record_trade("z", "JP", TradeDirection::Buy, 7);

        let rollup = store.region_rollup();
        assert_eq!(rollup[0].region, "TW");
        assert_eq!(rollup[0].total_score, i64::MAX);
        assert_eq!(rollup[0].player_count, 2);
        assert!(rollup[0].avg_score > Decimal::ZERO);
        assert_eq!(rollup[1].total_score, 7);
    }

    #[test]
    fn test_empty_store() {
        let store = LeaderboardStore::new();
        assert!(store.is_empty());
        assert!(store.top_n(10).is_empty());
        assert!(store.region_rollup().is_empty());
    }
}
