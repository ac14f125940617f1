//! Game controller: the single writer of lobby state.
//!
//! Runs as one task consuming [`GameEvent`]s in arrival order. Each event is
//! fully applied (state mutation plus every resulting send) before the next is
//! looked at, so a broadcast never carries a half-applied trade and a session's
//! `game_init` is queued ahead of anything broadcast after its join.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::{SessionId, TradeDirection, TradeRecord, Vote};
use crate::server::{Frame, InboundMessage, OutboundEvent};

use super::config::GameConfig;
use super::hub::{BroadcastHub, HubStats};
use super::leaderboard::LeaderboardStore;
use super::ledger::PriceLedger;
use super::registry::SessionRegistry;
use super::sentiment::SentimentTracker;

/// Capacity of the controller's inbox.
const EVENT_QUEUE: usize = 1024;

/// Something that happened to a session.
#[derive(Debug)]
pub enum GameEvent {
    /// A transport connection opened. The new session id is sent on `reply`.
    Connected {
        region: String,
        outbound: mpsc::Sender<Frame>,
        reply: oneshot::Sender<SessionId>,
    },

    /// A decoded client message.
    Inbound {
        session: SessionId,
        message: InboundMessage,
    },

    /// The transport connection closed.
    Disconnected { session: SessionId },
}

/// Cloneable front door to a running controller.
#[derive(Debug, Clone)]
pub struct GameHandle {
    tx: mpsc::Sender<GameEvent>,
}

impl GameHandle {
    /// Register a connection and wait for its session id.
    pub async fn connect(&self, region: String, outbound: mpsc::Sender<Frame>) -> Result<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.send(GameEvent::Connected {
            region,
            outbound,
            reply,
        })
        .await?;
        rx.await.context("Game controller dropped the connect reply")
    }

    pub async fn submit(&self, session: SessionId, message: InboundMessage) -> Result<()> {
        self.send(GameEvent::Inbound { session, message }).await
    }

    pub async fn disconnect(&self, session: SessionId) -> Result<()> {
        self.send(GameEvent::Disconnected { session }).await
    }

    async fn send(&self, event: GameEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow!("Game controller is not running"))
    }
}

/// Owns price, sentiment, leaderboard and sessions for the single lobby.
pub struct GameController {
    config: GameConfig,
    ledger: PriceLedger,
    sentiment: SentimentTracker,
    leaderboard: LeaderboardStore,
    recent_trades: VecDeque<TradeRecord>,
    registry: SessionRegistry,
    hub: BroadcastHub,
}

impl GameController {
    pub fn new(config: GameConfig) -> Self {
        let ledger = PriceLedger::new(
            config.initial_price,
            config.price_floor,
            config.history_capacity,
        );

        Self {
            recent_trades: VecDeque::with_capacity(config.recent_trades_capacity),
            ledger,
            sentiment: SentimentTracker::new(),
            leaderboard: LeaderboardStore::new(),
            registry: SessionRegistry::new(),
            hub: BroadcastHub::new(),
            config,
        }
    }

    /// Start the controller on its own task.
    pub fn spawn(config: GameConfig) -> (GameHandle, Arc<HubStats>, JoinHandle<()>) {
        let controller = Self::new(config);
        let stats = controller.hub.stats();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let task = tokio::spawn(controller.run(rx));
        (GameHandle { tx }, stats, task)
    }

    /// Process events until every [`GameHandle`] is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<GameEvent>) {
        info!(price = %self.ledger.current(), "Game controller started");
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
        }
        info!(
            price = %self.ledger.current(),
            players = self.leaderboard.len(),
            "Game controller stopped"
        );
    }

    pub fn dispatch(&mut self, event: GameEvent) {
        match event {
            GameEvent::Connected {
                region,
                outbound,
                reply,
            } => {
                let id = self.connect(region, outbound);
                if reply.send(id).is_err() {
                    // The connection task went away before learning its id.
                    self.disconnect(&id);
                }
            }
            GameEvent::Inbound { session, message } => self.handle_message(&session, message),
            GameEvent::Disconnected { session } => self.disconnect(&session),
        }
    }

    pub fn connect(&mut self, region: String, outbound: mpsc::Sender<Frame>) -> SessionId {
        let id = self.registry.register(region.clone(), outbound);
        debug!(session = %id, region = %region, "Session connected");
        id
    }

    pub fn handle_message(&mut self, session: &SessionId, message: InboundMessage) {
        match message {
            InboundMessage::JoinGame { username } => self.join(session, username),
            InboundMessage::TradeRequest { trade_type, volume } => {
                self.trade(session, trade_type, volume.unwrap_or(1))
            }
            InboundMessage::SentimentUpdate { sentiment } => self.vote(session, sentiment),
        }
    }

    fn join(&mut self, session: &SessionId, username: String) {
        if !self.registry.assign_identity(session, username.clone()) {
            debug!(session = %session, "Ignoring join from unknown or joined session");
            return;
        }

        let region = self
            .registry
            .get(session)
            .map(|h| h.session.region.clone())
            .unwrap_or_default();

        let init = self.game_init(&region);
        self.hub.unicast(&self.registry, session, &init);
        self.broadcast_online_count();

        info!(session = %session, username = %username, region = %region, "Player joined");
    }

    fn trade(&mut self, session: &SessionId, direction: TradeDirection, volume: i64) {
        let Some((identity, region)) = self.joined_identity(session) else {
            debug!(session = %session, "Ignoring trade from session that has not joined");
            return;
        };

        let settlement = self.ledger.apply_trade(direction, volume);
        let entry = self
            .leaderboard
            .record_trade(&identity, &region, direction, volume);

        let record = TradeRecord {
            identity,
            direction,
            volume,
            price_before: settlement.before,
            price_after: settlement.after,
            timestamp: Utc::now(),
        };
        self.recent_trades.push_front(record.clone());
        self.recent_trades.truncate(self.config.recent_trades_capacity);

        info!(
            username = %record.identity,
            side = direction.as_str(),
            volume,
            before = %settlement.before,
            after = %settlement.after,
            score = entry.score,
            "Trade settled"
        );

        let price_update = OutboundEvent::PriceUpdate {
            current_price: self.ledger.current(),
            price_history: self.ledger.history(),
            price_change: settlement.change(),
            last_trade: record,
        };
        self.hub.broadcast(&self.registry, &price_update);

        let leaderboard_update = OutboundEvent::LeaderboardUpdate {
            global: self.leaderboard.top_n(self.config.leaderboard_size),
            regional: self.leaderboard.region_rollup(),
        };
        self.hub.broadcast(&self.registry, &leaderboard_update);
    }

    fn vote(&mut self, session: &SessionId, vote: Vote) {
        if self.joined_identity(session).is_none() {
            debug!(session = %session, "Ignoring vote from session that has not joined");
            return;
        }

        self.sentiment.set_vote(*session, vote);
        let event = OutboundEvent::sentiment(self.sentiment.snapshot());
        self.hub.broadcast(&self.registry, &event);
    }

    pub fn disconnect(&mut self, session: &SessionId) {
        // The vote goes before the session record so it cannot leak.
        self.sentiment.clear_vote(session);

        let Some(removed) = self.registry.unregister(session) else {
            return;
        };
        if !removed.is_joined() {
            debug!(session = %session, "Unjoined session disconnected");
            return;
        }

        info!(
            session = %session,
            username = removed.identity.as_deref().unwrap_or_default(),
            "Player left"
        );

        self.broadcast_online_count();
        let event = OutboundEvent::sentiment(self.sentiment.snapshot());
        self.hub.broadcast(&self.registry, &event);
    }

    fn joined_identity(&self, session: &SessionId) -> Option<(String, String)> {
        let handle = self.registry.get(session)?;
        let identity = handle.session.identity.clone()?;
        Some((identity, handle.session.region.clone()))
    }

    fn broadcast_online_count(&self) {
        let event = OutboundEvent::OnlineCountUpdate {
            count: self.registry.count(),
        };
        self.hub.broadcast(&self.registry, &event);
    }

    fn game_init(&self, region: &str) -> OutboundEvent {
        OutboundEvent::GameInit {
            current_price: self.ledger.current(),
            price_history: self.ledger.history(),
            online_count: self.registry.count(),
            location: region.to_string(),
            leaderboard: self.leaderboard.top_n(self.config.leaderboard_size),
            region_ranking: self.leaderboard.region_rollup(),
            market_sentiment: self.sentiment.snapshot(),
            recent_trades: self.recent_trades.iter().cloned().collect(),
        }
    }
}
