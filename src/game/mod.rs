pub mod config;
pub mod controller;
pub mod hub;
pub mod leaderboard;
pub mod ledger;
pub mod registry;
pub mod sentiment;

pub use config::GameConfig;
pub use controller::{GameController, GameEvent, GameHandle};
pub use hub::{BroadcastHub, HubStats, HubStatsSnapshot};
pub use leaderboard::LeaderboardStore;
pub use ledger::{PriceLedger, Settlement};
pub use registry::{SessionHandle, SessionRegistry};
pub use sentiment::{SentimentSnapshot, SentimentTracker};
