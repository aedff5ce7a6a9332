//! The player registry: every connected session, by id and by name.
//!
//! # Concurrency note
//!
//! All state sits behind one `parking_lot::RwLock`. Every public method
//! takes the lock for exactly one critical section:
//!
//! - lookups (`get_by_id`, `get_by_name`, `list_all`, `size`) take the read
//!   side and may run in parallel with each other;
//! - `add`, `remove` and `disconnect_all` take the write side.
//!
//! Both indices are updated inside the same write section, so a reader
//! can never observe an id that has no name entry or the other way round.
//! `parking_lot` locks do not poison, so a panicking caller cannot wedge
//! the registry for everybody else.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hearth_types::PlayerId;
use parking_lot::RwLock;

use crate::Player;

/// Concurrent directory of connected players.
///
/// ## Indices
///
/// ```text
/// by_id   : PlayerId ──→ seq
/// by_name : lowercase name ──→ PlayerId
/// by_seq  : seq ──→ (handle, lowercase name)      (connection order)
/// ```
///
/// `seq` is a per-registry counter assigned on `add`, which keeps
/// [`list_all`](Self::list_all) in the order players connected.
pub struct PlayerRegistry<P: Player = crate::Session> {
    directory: RwLock<Directory<P>>,
}

struct Entry<P> {
    player: Arc<P>,
    name_key: String,
}

struct Directory<P> {
    by_seq: BTreeMap<u64, Entry<P>>,
    by_id: HashMap<PlayerId, u64>,
    by_name: HashMap<String, PlayerId>,
    next_seq: u64,
}

impl<P: Player> Directory<P> {
    fn new() -> Self {
        Self {
            by_seq: BTreeMap::new(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            next_seq: 0,
        }
    }

    fn insert(&mut self, id: PlayerId, name_key: String, player: Arc<P>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_name.insert(name_key.clone(), id);
        self.by_id.insert(id, seq);
        self.by_seq.insert(seq, Entry { player, name_key });
    }

    fn remove(&mut self, id: PlayerId) -> Option<Arc<P>> {
        let seq = self.by_id.remove(&id)?;
        let entry = self.by_seq.remove(&seq)?;
        if self.by_name.get(&entry.name_key) == Some(&id) {
            self.by_name.remove(&entry.name_key);
        }
        Some(entry.player)
    }

    fn get(&self, id: PlayerId) -> Option<&Arc<P>> {
        let seq = self.by_id.get(&id)?;
        self.by_seq.get(seq).map(|entry| &entry.player)
    }

    fn drain(&mut self) -> Vec<Arc<P>> {
        self.by_id.clear();
        self.by_name.clear();
        std::mem::take(&mut self.by_seq)
            .into_values()
            .map(|entry| entry.player)
            .collect()
    }
}

/// Case-folds a display name into its index key.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

impl<P: Player> PlayerRegistry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            directory: RwLock::new(Directory::new()),
        }
    }

    /// Registers a player under its id and its lowercased name.
    ///
    /// Last writer wins. The previous handle with the same id is replaced,
    /// and a *different* id already holding the same name (compared
    /// case-insensitively) is evicted so the name index keeps pointing at
    /// exactly one live player. Every handle pushed out this way is
    /// returned; an empty `Vec` means nothing was displaced.
    pub fn add(&self, player: Arc<P>) -> Vec<Arc<P>> {
        let id = player.id();
        let key = name_key(player.name());
        let mut displaced = Vec::new();

        {
            let mut dir = self.directory.write();

            if let Some(previous) = dir.remove(id) {
                displaced.push(previous);
            }
            if let Some(&holder) = dir.by_name.get(&key) {
                if let Some(previous) = dir.remove(holder) {
                    displaced.push(previous);
                }
            }
            dir.insert(id, key, player);
        }

        for previous in &displaced {
            if previous.id() == id {
                tracing::debug!(player_id = %id, "player re-registered, previous handle replaced");
            } else {
                tracing::warn!(
                    player_id = %id,
                    evicted = %previous.id(),
                    name = previous.name(),
                    "name already registered to another player, evicting it"
                );
            }
        }
        tracing::trace!(player_id = %id, "player registered");

        displaced
    }

    /// Unregisters a player. Returns its handle, or `None` if it was not
    /// registered.
    pub fn remove(&self, id: PlayerId) -> Option<Arc<P>> {
        let removed = self.directory.write().remove(id);
        if removed.is_some() {
            tracing::trace!(player_id = %id, "player unregistered");
        }
        removed
    }

    /// Looks a player up by id.
    pub fn get_by_id(&self, id: PlayerId) -> Option<Arc<P>> {
        self.directory.read().get(id).cloned()
    }

    /// Looks a player up by display name, ignoring case.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<P>> {
        let key = name_key(name);
        let dir = self.directory.read();
        let id = *dir.by_name.get(&key)?;
        dir.get(id).cloned()
    }

    /// Whether a player with this id is registered.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.directory.read().by_id.contains_key(&id)
    }

    /// A point-in-time copy of every registered player, in connection order.
    ///
    /// The returned `Vec` is detached from the registry: iterate it without
    /// holding any lock, later adds and removes do not touch it.
    pub fn list_all(&self) -> Vec<Arc<P>> {
        self.directory
            .read()
            .by_seq
            .values()
            .map(|entry| Arc::clone(&entry.player))
            .collect()
    }

    /// Empties the registry, then force-disconnects every player that still
    /// had a connection.
    ///
    /// The registry is cleared first, under the write lock, so no lookup can
    /// find a player that is being torn down. The disconnects run after the
    /// lock is released because they may be slow.
    ///
    /// Returns how many forced disconnects were issued.
    pub fn disconnect_all(&self) -> usize {
        let players = self.directory.write().drain();

        let mut disconnected = 0;
        for player in &players {
            if let Some(connection) = player.connection() {
                connection.force_disconnect();
                disconnected += 1;
            }
        }

        tracing::info!(
            players = players.len(),
            disconnected,
            "disconnected all players"
        );
        disconnected
    }

    /// Number of registered players.
    pub fn size(&self) -> usize {
        self.directory.read().by_id.len()
    }

    /// Returns `true` if no player is registered.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<P: Player> Default for PlayerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
