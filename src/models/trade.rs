//! Trade model: direction of a lobby trade and the record broadcast after it settles.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        }
    }

    /// Signed change a trade of `volume` applies to price and score.
    pub fn signed(&self, volume: i64) -> i64 {
        match self {
            TradeDirection::Buy => volume,
            TradeDirection::Sell => volume.saturating_neg(),
        }
    }
}

/// A settled trade, kept in the recent-trades window and echoed in `price_update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    /// Display name of the trading session
    #[serde(rename = "username")]
    pub identity: String,

    /// Buy or sell
    #[serde(rename = "type")]
    pub direction: TradeDirection,

    /// Requested volume, as sent by the client
    pub volume: i64,

    /// Price before settlement
    #[serde(rename = "price")]
    pub price_before: Decimal,

    /// Price after settlement (floor applied)
    #[serde(rename = "newPrice")]
    pub price_after: Decimal,

    /// Settlement time, serialized as Unix milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_volume() {
        assert_eq!(TradeDirection::Buy.signed(3), 3);
        assert_eq!(TradeDirection::Sell.signed(3), -3);
    }

    #[test]
    fn test_trade_record_wire_names() {
        let record = TradeRecord {
            identity: "alice".to_string(),
            direction: TradeDirection::Sell,
            volume: 2,
            price_before: dec!(100),
            price_after: dec!(98),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["type"], "sell");
        assert_eq!(json["volume"], 2);
        assert_eq!(json["price"], 100.0);
        assert_eq!(json["newPrice"], 98.0);
        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
    }
}
