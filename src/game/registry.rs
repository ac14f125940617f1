//! Live sessions and their outbound queues.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::models::{Session, SessionId};
use crate::server::Frame;

/// A registered connection: lobby metadata plus the queue its writer drains.
#[derive(Debug)]
pub struct SessionHandle {
    pub session: Session,
    outbound: mpsc::Sender<Frame>,
}

impl SessionHandle {
    pub fn outbound(&self) -> &mpsc::Sender<Frame> {
        &self.outbound
    }
}

/// Connection-keyed session table.
///
/// A session is counted online once it has joined; connected-but-unjoined
/// sessions receive nothing until their `game_init`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionHandle>,
    joined: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and allocate its id.
    pub fn register(&mut self, region: String, outbound: mpsc::Sender<Frame>) -> SessionId {
        let id = SessionId::new();
        self.sessions.insert(
            id,
            SessionHandle {
                session: Session::new(id, region),
                outbound,
            },
        );
        id
    }

    /// Bind a display name to a session that has not joined yet.
    ///
    /// Returns false when the session is unknown or already joined.
    pub fn assign_identity(&mut self, id: &SessionId, name: String) -> bool {
        let Some(handle) = self.sessions.get_mut(id) else {
            return false;
        };
        if handle.session.is_joined() {
            return false;
        }
        handle.session.join(name);
        self.joined += 1;
        true
    }

    /// Remove a session. Unknown ids are ignored.
    pub fn unregister(&mut self, id: &SessionId) -> Option<Session> {
        let handle = self.sessions.remove(id)?;
        if handle.session.is_joined() {
            self.joined -= 1;
        }
        Some(handle.session)
    }

    pub fn get(&self, id: &SessionId) -> Option<&SessionHandle> {
        self.sessions.get(id)
    }

    /// Sessions that have joined.
    pub fn count(&self) -> usize {
        self.joined
    }

    /// All registered connections, joined or not.
    #[cfg(test)]
    pub fn connected(&self) -> usize {
        self.sessions.len()
    }

    /// Visit every joined session.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&SessionHandle),
    {
        for handle in self.sessions.values() {
            if handle.session.is_joined() {
                f(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> mpsc::Sender<Frame> {
        mpsc::channel(4).0
    }

    #[test]
    fn test_register_and_join() {
        let mut registry = SessionRegistry::new();
        let a = registry.register("TW".to_string(), queue());
        let b = registry.register("JP".to_string(), queue());
        assert_ne!(a, b);
        assert_eq!(registry.connected(), 2);
        assert_eq!(registry.count(), 0);

        assert!(registry.assign_identity(&a, "alice".to_string()));
        assert_eq!(registry.count(), 1);
        assert_eq!(
            registry.get(&a).unwrap().session.identity.as_deref(),
            Some("alice")
        );

        // Joining twice is refused and does not double count.
        assert!(!registry.assign_identity(&a, "alice2".to_string()));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_unregister_idempotent() {
        let mut registry = SessionRegistry::new();
        let a = registry.register("TW".to_string(), queue());
        registry.assign_identity(&a, "alice".to_string());

        assert!(registry.unregister(&a).is_some());
        assert!(registry.unregister(&a).is_none());
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.connected(), 0);
        assert!(!registry.assign_identity(&a, "ghost".to_string()));
    }

    #[test]
    fn test_for_each_visits_joined_only() {
        let mut registry = SessionRegistry::new();
        let a = registry.register("TW".to_string(), queue());
        let _lurker = registry.register("TW".to_string(), queue());
        let c = registry.register("US".to_string(), queue());
        registry.assign_identity(&a, "a".to_string());
        registry.assign_identity(&c, "c".to_string());

        let mut seen = Vec::new();
        registry.for_each(|h| seen.push(h.session.id));
        seen.sort_by_key(|id| id.to_string());

        let mut expected = vec![a, c];
        expected.sort_by_key(|id| id.to_string());
        assert_eq!(seen, expected);
    }
}
