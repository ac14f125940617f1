//! Session model: one live client connection and what the lobby knows about it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection, generated at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A session's market sentiment vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Bull,
    Bear,
}

/// Lobby-side metadata for a connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,

    /// Display name, set by `join_game`
    pub identity: Option<String>,

    /// Region resolved once at connect time
    pub region: String,

    pub connected_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: SessionId, region: String) -> Self {
        Self {
            id,
            identity: None,
            region,
            connected_at: Utc::now(),
            joined_at: None,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.identity.is_some()
    }

    /// Bind a display name. Names are not checked for uniqueness.
    pub fn join(&mut self, name: String) {
        self.identity = Some(name);
        self.joined_at = Some(Utc::now());
    }
}
