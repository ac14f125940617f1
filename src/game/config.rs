//! Lobby configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Tunables for the shared lobby state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Price the lobby opens at
    pub initial_price: Decimal,

    /// Lowest price a trade can push the stock to
    pub price_floor: Decimal,

    /// Number of prices kept in the history ring
    pub history_capacity: usize,

    /// Number of trades kept in the recent-trades window
    pub recent_trades_capacity: usize,

    /// Rows in the global leaderboard
    pub leaderboard_size: usize,

    /// Outbound frames buffered per session before broadcasts skip it
    pub outbound_queue: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_price: dec!(100),
            price_floor: dec!(1),
            history_capacity: 100,
            recent_trades_capacity: 20,
            leaderboard_size: 10,
            outbound_queue: 64,
        }
    }
}
