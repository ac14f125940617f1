//! JSON wire format. Every frame is an object tagged by `action`.

use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::game::SentimentSnapshot;
use crate::models::{LeaderboardRow, RegionStanding, TradeDirection, TradeRecord, Vote};

/// A serialized outbound frame, shared between all recipients of a broadcast.
pub type Frame = Arc<str>;

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    JoinGame {
        username: String,
    },
    TradeRequest {
        #[serde(alias = "type")]
        trade_type: TradeDirection,
        #[serde(default)]
        volume: Option<i64>,
    },
    SentimentUpdate {
        sentiment: Vote,
    },
}

impl InboundMessage {
    /// Parse a text frame. Anything that is not a recognized, well-formed
    /// event yields `None`.
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Events the server sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    GameInit {
        current_price: Decimal,
        price_history: Vec<Decimal>,
        online_count: usize,
        location: String,
        leaderboard: Vec<LeaderboardRow>,
        region_ranking: Vec<RegionStanding>,
        market_sentiment: SentimentSnapshot,
        recent_trades: Vec<TradeRecord>,
    },
    PriceUpdate {
        current_price: Decimal,
        price_history: Vec<Decimal>,
        price_change: Decimal,
        last_trade: TradeRecord,
    },
    OnlineCountUpdate {
        count: usize,
    },
    LeaderboardUpdate {
        global: Vec<LeaderboardRow>,
        regional: Vec<RegionStanding>,
    },
    SentimentUpdate {
        bullish: u32,
        bearish: u32,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::GameInit { .. } => "game_init",
            OutboundEvent::PriceUpdate { .. } => "price_update",
            OutboundEvent::OnlineCountUpdate { .. } => "online_count_update",
            OutboundEvent::LeaderboardUpdate { .. } => "leaderboard_update",
            OutboundEvent::SentimentUpdate { .. } => "sentiment_update",
        }
    }

    pub fn sentiment(snapshot: SentimentSnapshot) -> Self {
        OutboundEvent::SentimentUpdate {
            bullish: snapshot.bullish,
            bearish: snapshot.bearish,
        }
    }

    pub fn encode(&self) -> Result<Frame> {
        let json = serde_json::to_string(self)
            .with_context(|| format!("Failed to serialize {} event", self.name()))?;
        Ok(Arc::from(json))
    }
}
