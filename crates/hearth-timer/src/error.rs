//! Error types for the scheduler.

/// Errors returned by [`Scheduler`](crate::Scheduler) lifecycle and
/// submission calls.
///
/// Failures *inside* a task are never returned here; they are logged by
/// the task guard and the scheduler carries on.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// The scheduler has not been started, or has been stopped.
    #[error("scheduler is not running")]
    NotRunning,

    /// A repeating task needs a non-zero period.
    #[error("repeating task period must be greater than zero")]
    ZeroPeriod,

    /// The requested delay lands past what the clock can represent.
    #[error("task deadline is too far in the future")]
    DeadlineOverflow,

    /// The timer thread or its runtime could not be created.
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}
