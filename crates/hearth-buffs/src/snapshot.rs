//! Snapshot types parked during a handoff.

use std::collections::HashMap;

use hearth_types::{EffectSource, MobSkillRef};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Buffs
// ---------------------------------------------------------------------------

/// One active buff at the moment the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffValue {
    /// The skill or item that granted the buff.
    pub source: EffectSource,
    /// Wall-clock time (epoch ms) at which the buff was applied. The
    /// receiving side uses it to compute the remaining duration.
    pub applied_at_ms: i64,
    /// The stat value the buff grants.
    pub value: i32,
}

impl BuffValue {
    pub fn new(source: EffectSource, applied_at_ms: i64, value: i32) -> Self {
        Self {
            source,
            applied_at_ms,
            value,
        }
    }
}

/// Every active buff of one player, in the order they were applied.
pub type BuffSnapshot = Vec<BuffValue>;

// ---------------------------------------------------------------------------
// Diseases
// ---------------------------------------------------------------------------

/// Debuffs a monster skill can inflict on a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disease {
    Slow,
    Seduce,
    Fishable,
    Zombify,
    Confuse,
    Stun,
    Poison,
    Seal,
    Darkness,
    Weaken,
    Curse,
}

/// When a disease wears off and which monster skill caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    /// Wall-clock expiry (epoch ms).
    pub expires_at_ms: i64,
    pub source: MobSkillRef,
}

impl DiseaseEntry {
    pub fn new(expires_at_ms: i64, source: MobSkillRef) -> Self {
        Self {
            expires_at_ms,
            source,
        }
    }

    /// Whether the disease has worn off at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Every active disease of one player.
pub type DiseaseSnapshot = HashMap<Disease, DiseaseEntry>;
