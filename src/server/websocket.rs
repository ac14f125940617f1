//! WebSocket transport for the lobby.
//!
//! Each accepted connection gets its own task that owns the socket, a bounded
//! outbound queue, and a session id allocated by the game controller. The task
//! forwards decoded client events to the controller and drains the queue onto
//! the socket. All lobby state stays with the controller.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

use crate::game::GameHandle;
use crate::geo::GeoLocator;

use super::protocol::{Frame, InboundMessage};

// ============================================================================
// Statistics
// ============================================================================

/// Transport counters.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Completed WebSocket handshakes.
    pub connections_accepted: AtomicU64,

    /// Connections currently open.
    pub active_connections: AtomicU64,

    /// Text frames decoded into client events.
    pub messages_received: AtomicU64,

    /// Text frames that did not decode and were dropped.
    pub messages_rejected: AtomicU64,

    /// Frames written to sockets.
    pub messages_sent: AtomicU64,
}

impl ServerStats {
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy)]
pub struct ServerStatsSnapshot {
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub messages_received: u64,
    pub messages_rejected: u64,
    pub messages_sent: u64,
}

// ============================================================================
// Server
// ============================================================================

/// Accepts lobby connections and bridges them to the game controller.
pub struct GameServer {
    listener: TcpListener,
    game: GameHandle,
    geo: Arc<GeoLocator>,
    outbound_queue: usize,
    stats: Arc<ServerStats>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Bind the listener. `outbound_queue` bounds each session's send buffer.
    pub async fn bind(
        addr: &str,
        game: GameHandle,
        geo: GeoLocator,
        outbound_queue: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            game,
            geo: Arc::new(geo),
            outbound_queue: outbound_queue.max(1),
            stats: Arc::new(ServerStats::default()),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Listener has no local address")
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Sender that stops the accept loop and closes every connection.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accept connections until shutdown is signalled.
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        info!(addr = %addr, geoip = self.geo.is_enabled(), "Lobby server listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => self.spawn_connection(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Lobby server shutting down");
                    break;
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            accepted = stats.connections_accepted,
            active = stats.active_connections,
            received = stats.messages_received,
            rejected = stats.messages_rejected,
            sent = stats.messages_sent,
            "Lobby server stopped"
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let connection = Connection {
            game: self.game.clone(),
            geo: Arc::clone(&self.geo),
            stats: Arc::clone(&self.stats),
            outbound_queue: self.outbound_queue,
            shutdown_rx: self.shutdown_tx.subscribe(),
        };

        tokio::spawn(async move {
            connection.serve(stream, peer).await;
        });
    }
}

// ============================================================================
// Connection
// ============================================================================

struct Connection {
    game: GameHandle,
    geo: Arc<GeoLocator>,
    stats: Arc<ServerStats>,
    outbound_queue: usize,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Connection {
    async fn serve(mut self, stream: TcpStream, peer: SocketAddr) {
        let mut headers = HeaderMap::new();
        let capture = |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
            headers = req.headers().clone();
            Ok(resp)
        };

        let ws_stream = match accept_hdr_async(stream, capture).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(peer = %peer, error = %e, "WebSocket handshake failed");
                return;
            }
        };

        let ip = client_ip(&headers, peer);
        let region = self.geo.locate(ip).await;

        let (tx, mut rx) = mpsc::channel::<Frame>(self.outbound_queue);
        let session = match self.game.connect(region.clone(), tx).await {
            Ok(id) => id,
            Err(e) => {
                error!(peer = %peer, error = %e, "Failed to register session");
                return;
            }
        };

        self.stats.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.stats.active_connections.fetch_add(1, Ordering::Relaxed);
        debug!(session = %session, ip = %ip, region = %region, "Connection open");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        debug!(session = %session, "Outbound queue closed");
                        break;
                    };
                    if let Err(e) = ws_tx.send(Message::Text(frame.to_string())).await {
                        debug!(session = %session, error = %e, "Failed to send frame");
                        break;
                    }
                    self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                }
                msg_result = ws_rx.next() => {
                    match msg_result {
                        Some(Ok(Message::Text(text))) => {
                            let Some(message) = InboundMessage::decode(&text) else {
                                debug!(session = %session, "Dropping malformed frame");
                                self.stats.messages_rejected.fetch_add(1, Ordering::Relaxed);
                                continue;
                            };
                            self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
                            if let Err(e) = self.game.submit(session, message).await {
                                warn!(session = %session, error = %e, "Game controller unavailable");
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_tx.send(Message::Pong(data)).await {
                                debug!(session = %session, error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            debug!(session = %session, "Client requested close");
                            break;
                        }
                        Some(Err(e)) => {
                            debug!(session = %session, error = %e, "WebSocket error");
                            break;
                        }
                        None => {
                            debug!(session = %session, "Connection closed");
                            break;
                        }
                        _ => {
                            // Binary and pong frames carry nothing for us.
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    debug!(session = %session, "Shutdown signal received");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        if let Err(e) = self.game.disconnect(session).await {
            debug!(session = %session, error = %e, "Disconnect not delivered");
        }
        self.stats.active_connections.fetch_sub(1, Ordering::Relaxed);
        debug!(session = %session, "Session ended");
    }
}

/// Address the client connected from: the first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };

    forwarded.or_else(real_ip).unwrap_or_else(|| peer.ip())
}
