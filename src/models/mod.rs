//! Data models for sessions, trades, and standings.

mod leaderboard;
mod session;
mod trade;

pub use leaderboard::{LeaderboardEntry, LeaderboardRow, RegionStanding};
pub use session::{Session, SessionId, Vote};
pub use trade::{TradeDirection, TradeRecord};
