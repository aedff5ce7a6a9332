//! Buff storage configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`BuffRegistry`](crate::BuffRegistry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuffConfig {
    /// How long a parked snapshot may wait for its owner before
    /// [`purge_expired`](crate::BuffRegistry::purge_expired) drops it.
    ///
    /// A handoff normally completes in well under a second; anything left
    /// after this belongs to a player who never arrived.
    ///
    /// Default: 2 minutes.
    pub snapshot_ttl: Duration,
}

impl Default for BuffConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(120),
        }
    }
}
