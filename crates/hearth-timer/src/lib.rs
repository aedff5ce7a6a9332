//! Single-threaded task scheduler for Hearth.
//!
//! Every piece of timed game logic (buff expiry checks, world ticks,
//! registry housekeeping) is submitted to one [`Scheduler`], which runs it
//! on a dedicated background thread, strictly one task at a time.
//!
//! # Scheduling modes
//!
//! - [`Scheduler::schedule_once`] — after a delay.
//! - [`Scheduler::schedule_at`] — at a wall-clock time.
//! - [`Scheduler::schedule_repeating`] — fixed rate, with an initial delay.
//!
//! Each returns a [`TaskHandle`] that can cancel future firings.
//!
//! # Fault isolation
//!
//! Tasks return `()` or `Result<(), E>`. An `Err` or a panic is caught at
//! the scheduling boundary, logged through `tracing`, and counted in
//! [`SchedulerMetrics::failed_tasks`]. A repeating task keeps its schedule
//! after a failed run.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use hearth_timer::{Scheduler, TimerConfig};
//!
//! let scheduler = Scheduler::new(TimerConfig::default());
//! scheduler.start()?;
//!
//! let tick = scheduler.schedule_repeating(
//!     || tracing::debug!("world tick"),
//!     Duration::from_millis(100),
//!     Duration::ZERO,
//! )?;
//!
//! // ... later
//! tick.cancel();
//! scheduler.stop();
//! # Ok::<(), hearth_timer::TimerError>(())
//! ```

mod config;
mod error;
mod metrics;
mod scheduler;
mod task;
mod worker;

pub use config::TimerConfig;
pub use error::TimerError;
pub use metrics::{MetricsSource, SchedulerMetrics, SchedulerState};
pub use scheduler::Scheduler;
pub use task::{TaskHandle, TaskId, TaskOutcome};
