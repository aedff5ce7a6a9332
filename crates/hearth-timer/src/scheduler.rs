//! The scheduler front end: lifecycle and submission.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::metrics::{Counters, MetricsSource, SchedulerMetrics, SchedulerState};
use crate::task::{self, Job, TaskHandle, TaskId, TaskOutcome, TaskState};
use crate::worker::{self, Command, Entry, Repeat};
use crate::{TimerConfig, TimerError};

/// Runs every timed piece of game logic on one background thread.
///
/// Construct one per server and pass it (usually in an `Arc`) to whatever
/// needs to schedule work. Tests build as many independent instances as
/// they like.
///
/// ## Guarantees
///
/// - Tasks execute one at a time, in deadline order (submission order for
///   equal deadlines), on the timer thread, never on the caller's thread.
/// - Submitting is an unbounded channel send: it never blocks.
/// - A task that returns `Err` or panics is logged and forgotten; the
///   timer thread and every other task keep going.
///
/// ## Lock discipline
///
/// `transition` serializes `start`/`stop` and owns the worker's
/// `JoinHandle`; `stop` joins the thread while holding it, so a new worker
/// can never overlap a finishing one. `commands` is only held long enough
/// to clone or swap the sender. Calls made from the timer thread itself
/// never touch `transition`, so a task can submit work or call `stop`
/// while another thread is mid-transition.
pub struct Scheduler {
    config: TimerConfig,
    counters: Arc<Counters>,
    transition: Mutex<Option<JoinHandle<()>>>,
    commands: RwLock<Option<UnboundedSender<Command>>>,
    worker_thread: Mutex<Option<ThreadId>>,
    next_task_id: AtomicU64,
}

impl Scheduler {
    /// Creates a stopped scheduler.
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config: config.validated(),
            counters: Arc::new(Counters::default()),
            transition: Mutex::new(None),
            commands: RwLock::new(None),
            worker_thread: Mutex::new(None),
            next_task_id: AtomicU64::new(1),
        }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Spawns the timer thread. No-op if already running.
    ///
    /// Also a no-op when called from inside a scheduled task: the timer
    /// thread cannot start a second copy of itself.
    ///
    /// # Errors
    /// [`TimerError::Spawn`] if the thread or its runtime cannot be created.
    pub fn start(&self) -> Result<(), TimerError> {
        if self.on_timer_thread() {
            warn!("start called from a scheduled task, ignoring");
            return Ok(());
        }

        let mut worker = self.transition.lock();
        if self.commands.read().is_some() {
            debug!("scheduler already running");
            return Ok(());
        }
        // A previous stop issued from the timer thread itself could not join.
        if let Some(previous) = worker.take() {
            join_worker(previous);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = worker::spawn(&self.config, Arc::clone(&self.counters), rx)?;
        *self.worker_thread.lock() = Some(handle.thread().id());
        *worker = Some(handle);
        *self.commands.write() = Some(tx);

        info!(thread = %self.config.thread_name, "scheduler started");
        Ok(())
    }

    /// Stops the timer thread. No-op if already stopped.
    ///
    /// Queued tasks are dropped; a task already executing finishes first.
    /// From any thread but the timer thread this waits for it to exit.
    pub fn stop(&self) {
        if self.on_timer_thread() {
            // Inside a task: the loop exits once this task returns. The
            // handle stays in `transition` for the next `start` to reap.
            if self.shut_down_worker() {
                info!("scheduler stopped from a scheduled task");
            }
            return;
        }

        let mut worker = self.transition.lock();
        if !self.shut_down_worker() {
            debug!("scheduler already stopped");
            return;
        }
        if let Some(handle) = worker.take() {
            join_worker(handle);
        }

        info!("scheduler stopped");
    }

    /// Detaches the command sender and tells the worker to exit. Returns
    /// `false` if there was no worker to stop.
    fn shut_down_worker(&self) -> bool {
        let Some(tx) = self.commands.write().take() else {
            return false;
        };
        // A send error means the worker already exited; nothing to tell.
        let _ = tx.send(Command::Shutdown);
        true
    }

    fn on_timer_thread(&self) -> bool {
        *self.worker_thread.lock() == Some(thread::current().id())
    }

    pub fn state(&self) -> SchedulerState {
        if self.commands.read().is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// `true` once stopped and the timer thread has exited.
    pub fn is_terminated(&self) -> bool {
        self.metrics().terminated
    }

    /// Current counters. Same as [`MetricsSource::metrics`].
    pub fn metrics(&self) -> SchedulerMetrics {
        self.counters.snapshot(self.state())
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------

    /// Runs `task` once, `delay` from now.
    ///
    /// # Errors
    /// - [`TimerError::DeadlineOverflow`] if `now + delay` overflows the clock.
    /// - [`TimerError::NotRunning`] if the scheduler is stopped.
    pub fn schedule_once<F, R>(&self, task: F, delay: Duration) -> Result<TaskHandle, TimerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: TaskOutcome,
    {
        self.submit(task::once_job(task), deadline_after(delay)?, None)
    }

    /// Runs `task` once at wall-clock time `at`. A time already in the past
    /// runs as soon as the timer thread gets to it.
    ///
    /// # Errors
    /// - [`TimerError::DeadlineOverflow`] if `at` is too far in the future.
    /// - [`TimerError::NotRunning`] if the scheduler is stopped.
    pub fn schedule_at<F, R>(&self, task: F, at: SystemTime) -> Result<TaskHandle, TimerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: TaskOutcome,
    {
        let delay = at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        self.schedule_once(task, delay)
    }

    /// Runs `task` every `period`, first after `initial_delay`, at a fixed
    /// rate.
    ///
    /// Firings are anchored to `now + initial_delay + k * period`, not to
    /// the end of the previous run. If a run overruns the next slot, the
    /// task fires again immediately and the missed slots are skipped. A
    /// period so long that the next slot overflows the clock makes the
    /// task fire once only.
    ///
    /// # Errors
    /// - [`TimerError::ZeroPeriod`] if `period` is zero.
    /// - [`TimerError::DeadlineOverflow`] if `now + initial_delay` overflows.
    /// - [`TimerError::NotRunning`] if the scheduler is stopped.
    pub fn schedule_repeating<F, R>(
        &self,
        task: F,
        period: Duration,
        initial_delay: Duration,
    ) -> Result<TaskHandle, TimerError>
    where
        F: FnMut() -> R + Send + 'static,
        R: TaskOutcome,
    {
        if period.is_zero() {
            return Err(TimerError::ZeroPeriod);
        }
        let first = deadline_after(initial_delay)?;
        self.submit(
            task::repeating_job(task),
            first,
            Some(Repeat {
                period,
                slot: first,
            }),
        )
    }

    fn submit(
        &self,
        job: Job,
        due: Instant,
        repeat: Option<Repeat>,
    ) -> Result<TaskHandle, TimerError> {
        let commands = self.commands.read();
        let tx = commands.as_ref().ok_or(TimerError::NotRunning)?;

        let id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(TaskState::default());
        let entry = Entry::new(id, due, job, Arc::clone(&state), repeat);

        // Counted before the send so the worker can never decrement first.
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        if tx.send(Command::Submit(entry)).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::Relaxed);
            return Err(TimerError::NotRunning);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        Ok(TaskHandle::new(id, state, tx.clone()))
    }
}

impl MetricsSource for Scheduler {
    fn metrics(&self) -> SchedulerMetrics {
        Scheduler::metrics(self)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn deadline_after(delay: Duration) -> Result<Instant, TimerError> {
    Instant::now()
        .checked_add(delay)
        .ok_or(TimerError::DeadlineOverflow)
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        // Tasks run under the guard, so only a bug in the worker itself
        // lands here.
        error!("timer thread panicked");
    }
}
