//! Best-effort fan-out of lobby events to session queues.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error};

use crate::models::SessionId;
use crate::server::{Frame, OutboundEvent};

use super::registry::{SessionHandle, SessionRegistry};

/// Delivery counters, shared with the server for reporting.
#[derive(Debug, Default)]
pub struct HubStats {
    /// Frames placed on a session queue.
    pub frames_sent: AtomicU64,

    /// Frames dropped because a queue was full or closed.
    pub frames_skipped: AtomicU64,

    /// Broadcasts performed.
    pub broadcasts: AtomicU64,
}

impl HubStats {
    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`HubStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    pub frames_sent: u64,
    pub frames_skipped: u64,
    pub broadcasts: u64,
}

#[derive(Debug, Default)]
pub struct BroadcastHub {
    stats: Arc<HubStats>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<HubStats> {
        Arc::clone(&self.stats)
    }

    /// Send `event` to every joined session. Serializes once; returns how many
    /// sessions accepted the frame.
    pub fn broadcast(&self, registry: &SessionRegistry, event: &OutboundEvent) -> usize {
        let Some(frame) = self.encode(event) else {
            return 0;
        };

        let mut delivered = 0;
        registry.for_each(|handle| {
            if self.deliver(handle, &frame) {
                delivered += 1;
            }
        });

        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        debug!(event = event.name(), delivered, "Broadcast complete");
        delivered
    }

    /// Send `event` to one session, joined or not.
    pub fn unicast(&self, registry: &SessionRegistry, id: &SessionId, event: &OutboundEvent) -> bool {
        let Some(handle) = registry.get(id) else {
            return false;
        };
        let Some(frame) = self.encode(event) else {
            return false;
        };
        self.deliver(handle, &frame)
    }

    fn encode(&self, event: &OutboundEvent) -> Option<Frame> {
        match event.encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(error = %e, "Dropping unserializable event");
                None
            }
        }
    }

    fn deliver(&self, handle: &SessionHandle, frame: &Frame) -> bool {
        match handle.outbound().try_send(Arc::clone(frame)) {
            Ok(()) => {
                self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!(session = %handle.session.id, "Outbound queue full, skipping");
                self.stats.frames_skipped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(session = %handle.session.id, "Outbound queue closed, skipping");
                self.stats.frames_skipped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn count_event(count: usize) -> OutboundEvent {
        OutboundEvent::OnlineCountUpdate { count }
    }

    #[test]
    fn test_broadcast_sends_identical_frames() {
        let mut registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let a = registry.register("TW".to_string(), tx_a);
        let b = registry.register("JP".to_string(), tx_b);
        registry.assign_identity(&a, "a".to_string());
        registry.assign_identity(&b, "b".to_string());

        let hub = BroadcastHub::new();
        assert_eq!(hub.broadcast(&registry, &count_event(2)), 2);

        let fa = rx_a.try_recv().unwrap();
        let fb = rx_b.try_recv().unwrap();
        assert_eq!(fa, fb);
        assert!(Arc::ptr_eq(&fa, &fb));
        assert!(fa.contains("\"online_count_update\""));
    }

    #[test]
    fn test_broadcast_skips_full_and_closed() {
        let mut registry = SessionRegistry::new();
        let (tx_full, _rx_full) = mpsc::channel(1);
        let (tx_dead, rx_dead) = mpsc::channel(4);
        let (tx_ok, mut rx_ok) = mpsc::channel(4);
        drop(rx_dead);

        for (tx, name) in [(tx_full.clone(), "full"), (tx_dead, "dead"), (tx_ok, "ok")] {
            let id = registry.register("TW".to_string(), tx);
            registry.assign_identity(&id, name.to_string());
        }
        tx_full.try_send(Arc::from("filler")).unwrap();

        let hub = BroadcastHub::new();
        assert_eq!(hub.broadcast(&registry, &count_event(3)), 1);
        assert!(rx_ok.try_recv().is_ok());

        let stats = hub.stats().snapshot();
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.frames_skipped, 2);
        assert_eq!(stats.broadcasts, 1);
    }

    #[test]
    fn test_unicast_reaches_unjoined_session() {
        let mut registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        let id = registry.register("TW".to_string(), tx);

        let hub = BroadcastHub::new();
        assert_eq!(hub.broadcast(&registry, &count_event(0)), 0);
        assert!(hub.unicast(&registry, &id, &count_event(0)));
        assert!(rx.try_recv().is_ok());

        assert!(!hub.unicast(&registry, &SessionId::new(), &count_event(0)));
    }
}
