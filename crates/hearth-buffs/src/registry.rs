//! The buff registry: take-once parking for buff and disease snapshots.
//!
//! # Concurrency note
//!
//! Each namespace is a `DashMap`, which shards its entries across
//! independent locks. `insert` and `remove` on one key are atomic, so a
//! `take` racing a `store` for the same player sees either the old
//! snapshot or the complete new one. Operations on different players only
//! contend when their keys hash to the same shard, and never observe each
//! other.

use std::time::Instant;

use dashmap::DashMap;
use hearth_types::PlayerId;

use crate::{BuffConfig, BuffSnapshot, DiseaseSnapshot};

/// A snapshot plus the instant it was parked.
#[derive(Debug)]
struct Parked<T> {
    value: T,
    parked_at: Instant,
}

impl<T> Parked<T> {
    fn now(value: T) -> Self {
        Self {
            value,
            parked_at: Instant::now(),
        }
    }
}

/// What [`BuffRegistry::purge_expired`] dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub buffs: usize,
    pub diseases: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.buffs + self.diseases
    }
}

/// Concurrent take-once store for per-player effect snapshots.
///
/// Buffs and diseases live in separate namespaces keyed by the same
/// [`PlayerId`]. Each namespace holds at most one snapshot per player; a
/// second `store` replaces the first wholesale.
pub struct BuffRegistry {
    buffs: DashMap<PlayerId, Parked<BuffSnapshot>>,
    diseases: DashMap<PlayerId, Parked<DiseaseSnapshot>>,
    config: BuffConfig,
}

impl BuffRegistry {
    pub fn new(config: BuffConfig) -> Self {
        Self {
            buffs: DashMap::new(),
            diseases: DashMap::new(),
            config,
        }
    }

    /// Parks a player's buffs, replacing any snapshot already parked.
    pub fn store_buffs(&self, player_id: PlayerId, snapshot: BuffSnapshot) {
        let count = snapshot.len();
        if self.buffs.insert(player_id, Parked::now(snapshot)).is_some() {
            tracing::debug!(%player_id, "replaced parked buff snapshot");
        }
        tracing::trace!(%player_id, buffs = count, "buffs parked");
    }

    /// Removes and returns a player's parked buffs.
    pub fn take_buffs(&self, player_id: PlayerId) -> Option<BuffSnapshot> {
        self.buffs.remove(&player_id).map(|(_, parked)| parked.value)
    }

    /// Parks a player's diseases, replacing any snapshot already parked.
    pub fn store_diseases(&self, player_id: PlayerId, snapshot: DiseaseSnapshot) {
        let count = snapshot.len();
        if self.diseases.insert(player_id, Parked::now(snapshot)).is_some() {
            tracing::debug!(%player_id, "replaced parked disease snapshot");
        }
        tracing::trace!(%player_id, diseases = count, "diseases parked");
    }

    /// Removes and returns a player's parked diseases.
    pub fn take_diseases(&self, player_id: PlayerId) -> Option<DiseaseSnapshot> {
        self.diseases.remove(&player_id).map(|(_, parked)| parked.value)
    }

    /// Number of parked buff snapshots.
    pub fn pending_buffs(&self) -> usize {
        self.buffs.len()
    }

    /// Number of parked disease snapshots.
    pub fn pending_diseases(&self) -> usize {
        self.diseases.len()
    }

    /// Drops every snapshot parked for longer than
    /// [`BuffConfig::snapshot_ttl`].
    ///
    /// Meant to run periodically on the scheduler.
    pub fn purge_expired(&self) -> PurgeReport {
        let ttl = self.config.snapshot_ttl;
        let mut report = PurgeReport::default();

        self.buffs.retain(|_, parked| {
            let keep = parked.parked_at.elapsed() < ttl;
            if !keep {
                report.buffs += 1;
            }
            keep
        });
        self.diseases.retain(|_, parked| {
            let keep = parked.parked_at.elapsed() < ttl;
            if !keep {
                report.diseases += 1;
            }
            keep
        });

        if report.total() > 0 {
            tracing::info!(
                buffs = report.buffs,
                diseases = report.diseases,
                "purged unclaimed snapshots"
            );
        }
        report
    }

    pub fn config(&self) -> &BuffConfig {
        &self.config
    }
}

impl Default for BuffRegistry {
    fn default() -> Self {
        Self::new(BuffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hearth_types::{EffectSource, MobSkillRef};

    use super::*;
    use crate::{BuffValue, Disease, DiseaseEntry};

    fn buffs(values: &[i32]) -> BuffSnapshot {
        values
            .iter()
            .map(|&v| BuffValue::new(EffectSource::Skill { id: 2_001_002, level: 10 }, 1_000, v))
            .collect()
    }

    fn poison(expires_at_ms: i64) -> DiseaseSnapshot {
        DiseaseSnapshot::from([(
            Disease::Poison,
            DiseaseEntry::new(expires_at_ms, MobSkillRef::new(125, 1)),
        )])
    }

    // =====================================================================
    // store / take
    // =====================================================================

    #[test]
    fn test_take_buffs_twice_returns_once() {
        let registry = BuffRegistry::default();
        registry.store_buffs(PlayerId(7), buffs(&[10, 20]));

        assert_eq!(registry.take_buffs(PlayerId(7)), Some(buffs(&[10, 20])));
        assert_eq!(registry.take_buffs(PlayerId(7)), None);
    }

    #[test]
    fn test_store_buffs_replaces_without_merging() {
        let registry = BuffRegistry::default();
        registry.store_buffs(PlayerId(1), buffs(&[1, 2, 3]));
        registry.store_buffs(PlayerId(1), buffs(&[9]));

        assert_eq!(registry.pending_buffs(), 1);
        assert_eq!(registry.take_buffs(PlayerId(1)), Some(buffs(&[9])));
    }

    #[test]
    fn test_take_unknown_returns_none() {
        let registry = BuffRegistry::default();
        assert!(registry.take_buffs(PlayerId(1)).is_none());
        assert!(registry.take_diseases(PlayerId(1)).is_none());
    }

    #[test]
    fn test_buff_and_disease_namespaces_are_independent() {
        let registry = BuffRegistry::default();
        registry.store_buffs(PlayerId(1), buffs(&[5]));
        registry.store_diseases(PlayerId(1), poison(5_000));

        assert!(registry.take_diseases(PlayerId(1)).is_some());
        assert_eq!(registry.pending_buffs(), 1, "taking diseases leaves buffs");
        assert!(registry.take_buffs(PlayerId(1)).is_some());
    }

    #[test]
    fn test_take_diseases_returns_exact_map_once() {
        let registry = BuffRegistry::default();
        let now = 1_700_000_000_000;
        let stored = poison(now + 5_000);
        registry.store_diseases(PlayerId(7), stored.clone());

        assert_eq!(registry.take_diseases(PlayerId(7)), Some(stored));
        assert_eq!(registry.take_diseases(PlayerId(7)), None);
    }

    #[test]
    fn test_store_empty_snapshot_is_still_taken_once() {
        let registry = BuffRegistry::default();
        registry.store_buffs(PlayerId(3), Vec::new());

        assert_eq!(registry.take_buffs(PlayerId(3)), Some(Vec::new()));
        assert_eq!(registry.take_buffs(PlayerId(3)), None);
    }

    // =====================================================================
    // purge_expired()
    // =====================================================================

    #[test]
    fn test_purge_expired_with_zero_ttl_drops_everything() {
        let registry = BuffRegistry::new(BuffConfig {
            snapshot_ttl: Duration::ZERO,
        });
        registry.store_buffs(PlayerId(1), buffs(&[1]));
        registry.store_buffs(PlayerId(2), buffs(&[2]));
        registry.store_diseases(PlayerId(1), poison(0));

        let report = registry.purge_expired();

        assert_eq!(report, PurgeReport { buffs: 2, diseases: 1 });
        assert_eq!(registry.pending_buffs(), 0);
        assert_eq!(registry.pending_diseases(), 0);
    }

    #[test]
    fn test_purge_expired_keeps_fresh_snapshots() {
        let registry = BuffRegistry::new(BuffConfig {
            snapshot_ttl: Duration::from_secs(3600),
        });
        registry.store_buffs(PlayerId(1), buffs(&[1]));

        assert_eq!(registry.purge_expired().total(), 0);
        assert!(registry.take_buffs(PlayerId(1)).is_some());
    }
}
