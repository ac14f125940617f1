//! Leaderboard models: per-identity entries and the rows broadcast to clients.

use rust_decimal::Decimal;
use serde::Serialize;

/// Cumulative standing of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub identity: String,

    /// Net score, never below zero
    pub score: i64,

    /// Number of trades, including ones the score floor absorbed
    pub trade_count: u64,

    /// Region seen on the identity's first trade
    pub region: String,
}

impl LeaderboardEntry {
    pub fn new(identity: String, region: String) -> Self {
        Self {
            identity,
            score: 0,
            trade_count: 0,
            region,
        }
    }

    /// Apply a signed score change, clamping at zero.
    pub fn apply(&mut self, delta: i64) {
        self.score = self.score.saturating_add(delta).max(0);
        self.trade_count += 1;
    }
}

/// Global leaderboard row as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub username: String,
    pub score: i64,
    pub location: String,
    pub trades: u64,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            username: entry.identity.clone(),
            score: entry.score,
            location: entry.region.clone(),
            trades: entry.trade_count,
        }
    }
}

/// Aggregated standing of one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStanding {
    pub region: String,
    pub total_score: i64,
    pub player_count: u32,

    /// Mean score rounded to 2 decimal places
    pub avg_score: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_score_floor() {
        let mut entry = LeaderboardEntry::new("bob".to_string(), "JP".to_string());
        entry.apply(2);
        entry.apply(-5);
        assert_eq!(entry.score, 0);
        assert_eq!(entry.trade_count, 2);

        entry.apply(3);
        assert_eq!(entry.score, 3);
        assert_eq!(entry.trade_count, 3);
    }

    #[test]
    fn test_row_from_entry() {
        let mut entry = LeaderboardEntry::new("carol".to_string(), "US".to_string());
        entry.apply(4);

        let row = LeaderboardRow::from(&entry);
        assert_eq!(row.username, "carol");
        assert_eq!(row.score, 4);
        assert_eq!(row.location, "US");
        assert_eq!(row.trades, 1);
    }
}
