//! Bull/bear votes, one replaceable vote per session.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{SessionId, Vote};

/// Aggregate vote counts as broadcast to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentSnapshot {
    pub bullish: u32,
    pub bearish: u32,
}

#[derive(Debug, Default)]
pub struct SentimentTracker {
    votes: HashMap<SessionId, Vote>,
    counts: SentimentSnapshot,
}

impl SentimentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `vote` for a session, replacing any earlier vote.
    pub fn set_vote(&mut self, session: SessionId, vote: Vote) {
        if let Some(prior) = self.votes.insert(session, vote) {
            self.decrement(prior);
        }
        match vote {
            Vote::Bull => self.counts.bullish += 1,
            Vote::Bear => self.counts.bearish += 1,
        }
    }

    /// Drop a session's vote. Returns the vote that was removed.
    ///
    /// The vote is forgotten on the first call, so repeated calls leave the
    /// counters untouched.
    pub fn clear_vote(&mut self, session: &SessionId) -> Option<Vote> {
        let prior = self.votes.remove(session)?;
        self.decrement(prior);
        Some(prior)
    }

    #[cfg(test)]
    pub fn vote_of(&self, session: &SessionId) -> Option<Vote> {
        self.votes.get(session).copied()
    }

    pub fn snapshot(&self) -> SentimentSnapshot {
        self.counts
    }

    fn decrement(&mut self, vote: Vote) {
        match vote {
            Vote::Bull => self.counts.bullish = self.counts.bullish.saturating_sub(1),
            Vote::Bear => self.counts.bearish = self.counts.bearish.saturating_sub(1),
        }
    }
}
