//! `ServerCore` builder and lifecycle.
//!
//! This is the entry point for embedding Hearth in a game server. It ties
//! the three components together without any global state: the player
//! directory, the buff handoff store and the scheduler are constructed
//! here and handed out as `Arc`s to whoever needs them.

use std::sync::Arc;
use std::time::Duration;

use hearth_buffs::{BuffConfig, BuffRegistry};
use hearth_players::{Player, PlayerRegistry, Session};
use hearth_timer::{Scheduler, SchedulerMetrics, TaskHandle, TimerConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::HearthError;

/// Configuration for the whole core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub timer: TimerConfig,
    pub buffs: BuffConfig,
    /// How often the scheduler purges buff snapshots nobody claimed.
    ///
    /// Default: 30 seconds.
    pub housekeeping_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            buffs: BuffConfig::default(),
            housekeeping_interval: Duration::from_secs(30),
        }
    }
}

/// Builder for a [`ServerCore`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use hearth::prelude::*;
///
/// let core: ServerCore = ServerCore::builder()
///     .housekeeping_interval(Duration::from_secs(10))
///     .build();
/// core.start()?;
/// assert!(core.scheduler().is_running());
/// core.shutdown();
/// # Ok::<(), HearthError>(())
/// ```
pub struct ServerCoreBuilder {
    config: CoreConfig,
}

impl ServerCoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the scheduler configuration.
    pub fn timer_config(mut self, timer: TimerConfig) -> Self {
        self.config.timer = timer;
        self
    }

    /// Sets the buff storage configuration.
    pub fn buff_config(mut self, buffs: BuffConfig) -> Self {
        self.config.buffs = buffs;
        self
    }

    /// Sets how often unclaimed buff snapshots are purged.
    pub fn housekeeping_interval(mut self, interval: Duration) -> Self {
        self.config.housekeeping_interval = interval;
        self
    }

    /// Builds a stopped core. Call [`ServerCore::start`] to run it.
    pub fn build<P: Player>(self) -> ServerCore<P> {
        ServerCore::new(self.config)
    }
}

impl Default for ServerCoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time numbers for an operations dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMetrics {
    pub players_online: usize,
    pub parked_buffs: usize,
    pub parked_diseases: usize,
    pub scheduler: SchedulerMetrics,
}

/// The runtime state core of one game server process.
pub struct ServerCore<P: Player = Session> {
    players: Arc<PlayerRegistry<P>>,
    buffs: Arc<BuffRegistry>,
    scheduler: Arc<Scheduler>,
    housekeeping: Mutex<Option<TaskHandle>>,
    housekeeping_interval: Duration,
}

impl ServerCore {
    /// Creates a new builder. Use [`ServerCoreBuilder::build`] with a type
    /// argument for a custom [`Player`] type.
    pub fn builder() -> ServerCoreBuilder {
        ServerCoreBuilder::new()
    }
}

impl<P: Player> ServerCore<P> {
    /// Creates a stopped core from `config`.
    pub fn new(config: CoreConfig) -> Self {
        Self {
            players: Arc::new(PlayerRegistry::new()),
            buffs: Arc::new(BuffRegistry::new(config.buffs)),
            scheduler: Arc::new(Scheduler::new(config.timer)),
            housekeeping: Mutex::new(None),
            housekeeping_interval: config.housekeeping_interval,
        }
    }

    /// Starts the scheduler and registers buff housekeeping.
    ///
    /// Calling it again while running changes nothing. Housekeeping is
    /// registered again if the scheduler was stopped behind the core's back
    /// (through [`scheduler`](Self::scheduler)), since that drops it.
    ///
    /// # Errors
    /// [`HearthError::Timer`] if the timer thread cannot be started, or the
    /// housekeeping task cannot be scheduled (zero or overflowing
    /// interval). In the latter case a scheduler started by this call is
    /// stopped again.
    pub fn start(&self) -> Result<(), HearthError> {
        let was_running = self.scheduler.is_running();
        self.scheduler.start()?;

        let mut housekeeping = self.housekeeping.lock();
        if housekeeping.as_ref().is_none_or(TaskHandle::is_done) {
            let buffs = Arc::clone(&self.buffs);
            let scheduled = self.scheduler.schedule_repeating(
                move || {
                    buffs.purge_expired();
                },
                self.housekeeping_interval,
                self.housekeeping_interval,
            );
            match scheduled {
                Ok(handle) => *housekeeping = Some(handle),
                Err(err) => {
                    *housekeeping = None;
                    if !was_running {
                        self.scheduler.stop();
                    }
                    return Err(err.into());
                }
            }
        }

        tracing::info!(
            housekeeping_secs = self.housekeeping_interval.as_secs_f64(),
            "server core running"
        );
        Ok(())
    }

    /// Stops housekeeping, force-disconnects every player and stops the
    /// scheduler. Returns how many players were disconnected.
    pub fn shutdown(&self) -> usize {
        if let Some(handle) = self.housekeeping.lock().take() {
            handle.cancel();
        }
        let disconnected = self.players.disconnect_all();
        self.scheduler.stop();

        tracing::info!(disconnected, "server core shut down");
        disconnected
    }

    pub fn players(&self) -> &Arc<PlayerRegistry<P>> {
        &self.players
    }

    pub fn buffs(&self) -> &Arc<BuffRegistry> {
        &self.buffs
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn metrics(&self) -> CoreMetrics {
        CoreMetrics {
            players_online: self.players.size(),
            parked_buffs: self.buffs.pending_buffs(),
            parked_diseases: self.buffs.pending_diseases(),
            scheduler: self.scheduler.metrics(),
        }
    }
}
