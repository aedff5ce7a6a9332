//! Shared vocabulary for Hearth.
//!
//! Every Hearth crate keys its state by the same identifiers, so they live
//! here rather than in any one component:
//!
//! - [`PlayerId`] — the numeric session id used by the player directory
//!   and the buff handoff store alike.
//! - [`EffectSource`] / [`MobSkillRef`] — opaque descriptors of *where* an
//!   effect came from. Hearth never interprets them; game-rule code does.
//!
//! ```text
//! hearth-players ─┐
//!                 ├──→ hearth-types
//! hearth-buffs ───┘
//! ```

mod types;

pub use types::{EffectSource, MobSkillRef, PlayerId};
