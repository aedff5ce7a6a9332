//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Name of the background execution thread (shows up in panics,
    /// debuggers and `top -H`).
    pub thread_name: String,
    /// A task execution taking at least this long is logged at `warn`.
    /// Advisory only; slow tasks are never interrupted.
    pub slow_task_warn: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            thread_name: "hearth-timer".to_string(),
            slow_task_warn: Duration::from_millis(250),
        }
    }
}

impl TimerConfig {
    /// Fix any unusable values. Called by [`Scheduler::new`](crate::Scheduler::new).
    pub fn validated(mut self) -> Self {
        if self.thread_name.trim().is_empty() {
            warn!("empty timer thread name, using default");
            self.thread_name = Self::default().thread_name;
        }
        if self.slow_task_warn.is_zero() {
            warn!("slow_task_warn of zero would warn on every task, using default");
            self.slow_task_warn = Self::default().slow_task_warn;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_restores_defaults() {
        let cfg = TimerConfig {
            thread_name: "  ".into(),
            slow_task_warn: Duration::ZERO,
        }
        .validated();
        assert_eq!(cfg.thread_name, "hearth-timer");
        assert_eq!(cfg.slow_task_warn, Duration::from_millis(250));
    }

    #[test]
    fn test_validated_keeps_good_values() {
        let cfg = TimerConfig {
            thread_name: "world-clock".into(),
            slow_task_warn: Duration::from_secs(1),
        }
        .validated();
        assert_eq!(cfg.thread_name, "world-clock");
        assert_eq!(cfg.slow_task_warn, Duration::from_secs(1));
    }
}
