//! Task plumbing: outcomes, the failure guard, and cancellable handles.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tracing::error;

use crate::worker::Command;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifier of one submitted task, unique per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What a task closure may return.
///
/// Plain `()` closures always succeed. Closures returning
/// `Result<(), E>` report failure through `Err`, which the guard logs
/// with `E`'s `Display` output.
pub trait TaskOutcome {
    fn into_result(self) -> Result<(), String>;
}

impl TaskOutcome for () {
    fn into_result(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> TaskOutcome for Result<(), E> {
    fn into_result(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

/// A type-erased task body as the worker stores it.
pub(crate) type Job = Box<dyn FnMut() -> Result<(), String> + Send + 'static>;

pub(crate) fn once_job<F, R>(task: F) -> Job
where
    F: FnOnce() -> R + Send + 'static,
    R: TaskOutcome,
{
    let mut task = Some(task);
    Box::new(move || match task.take() {
        Some(task) => task().into_result(),
        None => Ok(()),
    })
}

pub(crate) fn repeating_job<F, R>(mut task: F) -> Job
where
    F: FnMut() -> R + Send + 'static,
    R: TaskOutcome,
{
    Box::new(move || task().into_result())
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Runs one execution of `job`, catching both an `Err` return and a panic.
///
/// Nothing escapes: the failure is logged and `false` is returned. The
/// worker calls every execution through here, so a broken task can never
/// take the timer thread down with it.
pub(crate) fn guard(id: TaskId, job: &mut Job) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| job())) {
        Ok(Ok(())) => true,
        Ok(Err(reason)) => {
            error!(task_id = %id, error = %reason, "scheduled task failed");
            false
        }
        Err(payload) => {
            error!(
                task_id = %id,
                panic = panic_message(payload.as_ref()),
                "scheduled task panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cancellation and completion flags shared by a handle and its queue entry.
#[derive(Debug, Default)]
pub(crate) struct TaskState {
    cancelled: AtomicBool,
    done: AtomicBool,
}

impl TaskState {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }
}

/// Handle to a scheduled task.
///
/// Dropping the handle does *not* cancel the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    state: Arc<TaskState>,
    commands: UnboundedSender<Command>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, state: Arc<TaskState>, commands: UnboundedSender<Command>) -> Self {
        Self {
            id,
            state,
            commands,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Prevents every firing that has not started yet.
    ///
    /// An execution already in flight runs to completion. Returns `false`
    /// if the task had already finished for good (a fired one-shot) or was
    /// cancelled before.
    pub fn cancel(&self) -> bool {
        if self.state.done.load(Ordering::Acquire) {
            return false;
        }
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Lets the worker drop the queue entry right away. If the worker is
        // gone the entry is gone too.
        let _ = self.commands.send(Command::Cancel(self.id));
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// `true` once the task will never run again: a one-shot that has
    /// fired, a cancelled task the worker has dropped, or a task discarded
    /// by `stop`.
    pub fn is_done(&self) -> bool {
        self.state.done.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_passes_success() {
        let mut job = repeating_job(|| ());
        assert!(guard(TaskId(1), &mut job));
    }

    #[test]
    fn test_guard_catches_err() {
        let mut job = repeating_job(|| Err::<(), _>("boom"));
        assert!(!guard(TaskId(1), &mut job));
    }

    #[test]
    fn test_guard_catches_panic_and_job_stays_usable() {
        let mut calls = 0;
        let mut job = repeating_job(move || {
            calls += 1;
            if calls == 1 {
                panic!("first call explodes");
            }
        });
        assert!(!guard(TaskId(1), &mut job));
        assert!(guard(TaskId(1), &mut job));
    }

    #[test]
    fn test_once_job_runs_body_once() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut job = once_job(move || tx.send(()).unwrap());
        assert!(guard(TaskId(1), &mut job));
        assert!(guard(TaskId(1), &mut job));
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(9).to_string(), "T-9");
    }
}
