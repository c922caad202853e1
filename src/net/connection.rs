//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Accepted → Handshaking → Established → Serving → Closed)
//! - Generate unique connection IDs for tracing
//! - Count open connections so shutdown can wait for them

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
///
/// ```text
/// Accepted → Handshaking → Established → Serving → Closed
///                        ↘ HandshakeFailed → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP connection accepted, nothing read yet.
    Accepted,
    /// TLS handshake in progress.
    Handshaking,
    /// Handshake done and the peer chain handed to the observer.
    Established,
    /// HTTP requests are being served.
    Serving,
    /// Handshake failed; the connection is being dropped.
    HandshakeFailed,
    /// Connection is closed.
    Closed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Accepted, Handshaking)
                | (Handshaking, Established)
                | (Handshaking, HandshakeFailed)
                | (Established, Serving)
                | (Serving, Closed)
                | (HandshakeFailed, Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Established => "established",
            ConnectionState::Serving => "serving",
            ConnectionState::HandshakeFailed => "handshake_failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Tracks active connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
            state: ConnectionState::Accepted,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all connections are closed.
    pub async fn wait_for_idle(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime and state.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
    state: ConnectionState,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`. Illegal transitions are ignored and logged.
    pub fn transition(&mut self, next: ConnectionState) {
        if self.state.can_transition_to(next) {
            tracing::trace!(connection_id = %self.id, from = %self.state, to = %next, "Connection state change");
            self.state = next;
        } else {
            tracing::warn!(connection_id = %self.id, from = %self.state, to = %next, "Ignoring illegal connection state change");
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, last_state = %self.state, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn successful_connection_path() {
        let tracker = ConnectionTracker::new();
        let mut guard = tracker.track();

        for next in [
            ConnectionState::Handshaking,
            ConnectionState::Established,
            ConnectionState::Serving,
            ConnectionState::Closed,
        ] {
            guard.transition(next);
            assert_eq!(guard.state(), next);
        }
    }

    #[test]
    fn failed_handshake_never_reaches_established() {
        let tracker = ConnectionTracker::new();
        let mut guard = tracker.track();

        guard.transition(ConnectionState::Handshaking);
        guard.transition(ConnectionState::HandshakeFailed);
        guard.transition(ConnectionState::Established);
        assert_eq!(guard.state(), ConnectionState::HandshakeFailed);

        guard.transition(ConnectionState::Closed);
        assert_eq!(guard.state(), ConnectionState::Closed);
    }

    #[test]
    fn cannot_skip_the_handshake() {
        assert!(!ConnectionState::Accepted.can_transition_to(ConnectionState::Established));
        assert!(!ConnectionState::Accepted.can_transition_to(ConnectionState::Serving));
    }

    #[tokio::test]
    async fn wait_for_idle_returns_once_drained() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_idle().await })
        };
        drop(guard);

        tokio::time::timeout(std::time::Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
