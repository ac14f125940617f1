//! Client-facing wire protocol and WebSocket transport.

mod protocol;
mod websocket;

pub use protocol::{Frame, InboundMessage, OutboundEvent};
pub use websocket::{client_ip, GameServer, ServerStats, ServerStatsSnapshot};
