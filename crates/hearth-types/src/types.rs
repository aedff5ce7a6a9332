//! Identity and effect-descriptor types.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The unique id of a connected player (character) session.
///
/// A newtype over `u64` so that a player id can never be mixed up with a
/// skill id or a timestamp in a function signature. It is `Copy`, hashable
/// and serializes as the bare number (`#[serde(transparent)]`), so a
/// `PlayerId(42)` is just `42` in JSON.
///
/// The id is stable for the lifetime of a session and is the key shared by
/// the player directory and the buff handoff store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

/// `tracing::info!(%player_id, "...")` prints `P-42`.
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// Effect descriptors
// ---------------------------------------------------------------------------

/// Where an active buff came from.
///
/// Game logic resolves this back into the full stat effect when a buff
/// snapshot is restored; the core only carries it across the handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectSource {
    /// A player skill at a given level.
    Skill { id: u32, level: u8 },
    /// A consumable or equipped item.
    Item { id: u32 },
}

impl fmt::Display for EffectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skill { id, level } => write!(f, "skill {id} lv{level}"),
            Self::Item { id } => write!(f, "item {id}"),
        }
    }
}

/// A monster skill that inflicted a disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MobSkillRef {
    pub id: u16,
    pub level: u8,
}

impl MobSkillRef {
    pub fn new(id: u16, level: u8) -> Self {
        Self { id, level }
    }
}

impl fmt::Display for MobSkillRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mobskill {} lv{}", self.id, self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_player_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_effect_source_is_tagged() {
        let json = serde_json::to_string(&EffectSource::Skill { id: 2_301_004, level: 20 }).unwrap();
        assert_eq!(json, r#"{"kind":"skill","id":2301004,"level":20}"#);
    }

    #[test]
    fn test_effect_source_display() {
        assert_eq!(EffectSource::Item { id: 2_022_179 }.to_string(), "item 2022179");
        assert_eq!(MobSkillRef::new(125, 3).to_string(), "mobskill 125 lv3");
    }
}
