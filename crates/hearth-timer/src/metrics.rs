//! Read-only scheduler counters for dashboards and health checks.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Scheduler`](crate::Scheduler).
///
/// ```text
/// Stopped ──start()──→ Running ──stop()──→ Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Point-in-time copy of the scheduler counters.
///
/// The counters are advisory: they are updated with relaxed atomics and
/// never feed back into scheduling decisions. Two fields read in the same
/// snapshot may be a task apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    pub state: SchedulerState,
    /// Task executions in flight right now: 0 or 1.
    pub active_tasks: usize,
    /// Executions that have finished, successful or not. A repeating task
    /// counts once per firing.
    pub completed_tasks: u64,
    /// Executions that returned an error or panicked.
    pub failed_tasks: u64,
    /// Tasks waiting to fire, repeating tasks included.
    pub queued_tasks: usize,
    /// Tasks ever accepted by the scheduler.
    pub total_tasks: u64,
    /// `true` once the timer thread has exited.
    pub terminated: bool,
}

/// Anything an external metrics collector can poll.
pub trait MetricsSource: Send + Sync {
    fn metrics(&self) -> SchedulerMetrics;
}

/// Counters shared between the scheduler front end and its worker thread.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) active: AtomicUsize,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) queued: AtomicUsize,
    pub(crate) submitted: AtomicU64,
    pub(crate) worker_alive: AtomicBool,
}

impl Counters {
    pub(crate) fn snapshot(&self, state: SchedulerState) -> SchedulerMetrics {
        SchedulerMetrics {
            state,
            active_tasks: self.active.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            queued_tasks: self.queued.load(Ordering::Relaxed),
            total_tasks: self.submitted.load(Ordering::Relaxed),
            terminated: state == SchedulerState::Stopped
                && !self.worker_alive.load(Ordering::Acquire),
        }
    }
}
