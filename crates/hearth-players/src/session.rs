//! Session handles: what the registry knows about one connected player.
//!
//! A session handle answers three questions:
//! - WHO the player is (`PlayerId`, stable for the whole session)
//! - WHAT they are called (display name, looked up case-insensitively)
//! - HOW to kick them (an optional [`Connection`] reference)
//!
//! The registry only ever holds an `Arc` to a handle. The code that created
//! the session owns it too, so removing a player from the registry never
//! destroys the session on its own.

use std::fmt;
use std::sync::Arc;

use hearth_types::PlayerId;
use parking_lot::RwLock;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// The network side of a session, reduced to the one thing the core needs.
///
/// `force_disconnect` may be slow (flushing sockets, saving state through a
/// collaborator). [`PlayerRegistry::disconnect_all`](crate::PlayerRegistry::disconnect_all)
/// always calls it after releasing its lock.
pub trait Connection: Send + Sync + 'static {
    /// Tears the connection down without waiting for the client.
    fn force_disconnect(&self);
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Anything the registry can index.
///
/// Game servers usually implement this on their own character type; the
/// ready-made [`Session`] covers everything else (and the tests).
///
/// `id()` and `name()` must not change while the handle is registered.
/// The registry computes its index keys once, on [`add`](crate::PlayerRegistry::add).
pub trait Player: Send + Sync + 'static {
    fn id(&self) -> PlayerId;

    fn name(&self) -> &str;

    /// The live connection, or `None` once it has been detached.
    fn connection(&self) -> Option<Arc<dyn Connection>>;
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A plain session handle: id, name and a detachable connection.
pub struct Session {
    id: PlayerId,
    name: String,
    connection: RwLock<Option<Arc<dyn Connection>>>,
}

impl Session {
    /// Creates a session bound to `connection`.
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            connection: RwLock::new(Some(connection)),
        }
    }

    /// Creates a session with no connection (bots, or a player mid-transfer).
    pub fn detached(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            connection: RwLock::new(None),
        }
    }

    /// Drops the connection reference and returns it.
    ///
    /// After this, `disconnect_all` skips the session.
    pub fn detach_connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection.write().take()
    }

    /// Whether a connection is still attached.
    pub fn is_connected(&self) -> bool {
        self.connection.read().is_some()
    }
}

impl Player for Session {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection.read().clone()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingConnection(AtomicUsize);

    impl Connection for CountingConnection {
        fn force_disconnect(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_new_session_is_connected() {
        let session = Session::new(PlayerId(1), "Alice", Arc::new(CountingConnection::default()));
        assert!(session.is_connected());
        assert!(session.connection().is_some());
        assert_eq!(session.name(), "Alice");
        assert_eq!(session.id(), PlayerId(1));
    }

    #[test]
    fn test_detach_connection_returns_it_once() {
        let conn = Arc::new(CountingConnection::default());
        let session = Session::new(PlayerId(1), "Alice", conn.clone());

        let detached = session.detach_connection().expect("was attached");
        detached.force_disconnect();

        assert!(!session.is_connected());
        assert!(session.detach_connection().is_none());
        assert_eq!(conn.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_session_has_no_connection() {
        let session = Session::detached(PlayerId(2), "Bot");
        assert!(session.connection().is_none());
        assert!(format!("{session:?}").contains("connected: false"));
    }
}
