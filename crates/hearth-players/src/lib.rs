//! Directory of connected players for Hearth.
//!
//! This crate answers "who is online right now?" for the rest of the
//! server:
//!
//! 1. **Registration** — network workers [`add`](PlayerRegistry::add) a
//!    session on login and [`remove`](PlayerRegistry::remove) it on logout.
//! 2. **Lookup** — by id, or by display name regardless of case.
//! 3. **Mass disconnect** — [`disconnect_all`](PlayerRegistry::disconnect_all)
//!    on shutdown.
//!
//! # Concurrency
//!
//! [`PlayerRegistry`] is `Sync` and meant to be shared behind an `Arc`.
//! Lookups run in parallel; registration and removal are exclusive, so the
//! id index and the name index are never seen half-updated.

mod registry;
mod session;

pub use registry::PlayerRegistry;
pub use session::{Connection, Player, Session};
