//! # Hearth
//!
//! Runtime state core for multiplayer game servers.
//!
//! Hearth keeps track of who is online, parks transient effect state while
//! a player changes channel, and runs every timed piece of game logic on a
//! single scheduler thread. Game rules, networking and persistence stay in
//! your code; Hearth only makes sure shared state stays consistent and
//! scheduled work runs when it should.
//!
//! ## Components
//!
//! - [`PlayerRegistry`] — connected players by id and case-insensitive name.
//! - [`BuffRegistry`] — take-once buff/disease snapshots keyed by player id.
//! - [`Scheduler`] — one-shot, timestamped and fixed-rate tasks.
//! - [`ServerCore`] — builds and wires the three together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use hearth::prelude::*;
//!
//! hearth::init_tracing();
//!
//! let core: ServerCore = ServerCore::builder().build();
//! core.start()?;
//!
//! core.scheduler().schedule_repeating(
//!     || tracing::debug!("world tick"),
//!     Duration::from_millis(100),
//!     Duration::ZERO,
//! )?;
//!
//! // on shutdown
//! core.shutdown();
//! # Ok::<(), HearthError>(())
//! ```

mod core;
mod error;
mod telemetry;

pub use crate::core::{CoreConfig, CoreMetrics, ServerCore, ServerCoreBuilder};
pub use error::HearthError;
pub use telemetry::init_tracing;

pub use hearth_buffs::{
    BuffConfig, BuffRegistry, BuffSnapshot, BuffValue, Disease, DiseaseEntry, DiseaseSnapshot,
    PurgeReport,
};
pub use hearth_players::{Connection, Player, PlayerRegistry, Session};
pub use hearth_timer::{
    MetricsSource, Scheduler, SchedulerMetrics, SchedulerState, TaskHandle, TaskId, TaskOutcome,
    TimerConfig, TimerError,
};
pub use hearth_types::{EffectSource, MobSkillRef, PlayerId};

/// Everything a game server usually needs in one import.
pub mod prelude {
    pub use crate::{
        BuffRegistry, Connection, CoreConfig, HearthError, Player, PlayerId, PlayerRegistry,
        Scheduler, ServerCore, Session, TaskHandle,
    };
}
