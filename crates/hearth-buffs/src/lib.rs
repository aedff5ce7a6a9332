//! Buff handoff storage for Hearth.
//!
//! When a player changes channel (or world), their session is torn down on
//! one side and rebuilt on the other. Active buffs and diseases are not
//! persisted, so the old session parks them here and the new session picks
//! them up:
//!
//! ```text
//! old session ──store_buffs(id)──→ BuffRegistry ──take_buffs(id)──→ new session
//! ```
//!
//! Retrieval is *take-once*: reading a snapshot removes it.

mod config;
mod registry;
mod snapshot;

pub use config::BuffConfig;
pub use registry::{BuffRegistry, PurgeReport};
pub use snapshot::{BuffSnapshot, BuffValue, Disease, DiseaseEntry, DiseaseSnapshot};
