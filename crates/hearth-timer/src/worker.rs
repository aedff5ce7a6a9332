//! The timer thread: a delay queue driven by a current-thread Tokio runtime.
//!
//! The worker owns the queue outright. Everyone else talks to it through an
//! unbounded channel, so submitting never blocks and the queue needs no
//! lock. The loop sits in `tokio::select!` between the channel and a
//! `sleep_until` on the earliest deadline:
//!
//! ```text
//! loop {
//!     select! {
//!         cmd  = commands.recv()      => submit / cancel / shutdown
//!         ()   = sleep_until(next_due) => fire the earliest entry
//!     }
//! }
//! ```
//!
//! Exactly one entry fires per iteration, so a shutdown or cancel queued
//! behind a burst of due tasks is honoured before the next firing. Commands
//! are taken in batches of at most [`COMMAND_BATCH`], and a due entry fires
//! after every batch, so a steady stream of submissions cannot hold back
//! the queue.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::TimerConfig;
use crate::metrics::Counters;
use crate::task::{Job, TaskId, TaskState, guard};

/// Commands handled before the worker checks the queue again.
const COMMAND_BATCH: usize = 64;

/// Messages from the scheduler front end and task handles.
pub(crate) enum Command {
    Submit(Entry),
    Cancel(TaskId),
    Shutdown,
}

/// Fixed-rate repetition of an entry.
pub(crate) struct Repeat {
    pub(crate) period: Duration,
    /// The grid point this firing belongs to: `start + initial_delay + k*period`.
    pub(crate) slot: Instant,
}

/// One queued task.
pub(crate) struct Entry {
    pub(crate) id: TaskId,
    pub(crate) due: Instant,
    pub(crate) job: Job,
    pub(crate) state: Arc<TaskState>,
    pub(crate) repeat: Option<Repeat>,
    /// Tie-breaker assigned by the worker: equal deadlines fire in the order
    /// the entries reached the queue.
    seq: u64,
}

impl Entry {
    pub(crate) fn new(
        id: TaskId,
        due: Instant,
        job: Job,
        state: Arc<TaskState>,
        repeat: Option<Repeat>,
    ) -> Self {
        Self {
            id,
            due,
            job,
            state,
            repeat,
            seq: 0,
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Starts the timer thread.
///
/// The runtime is built on the calling thread so that a failure surfaces
/// as an error from `start` instead of a dead thread.
pub(crate) fn spawn(
    config: &TimerConfig,
    counters: Arc<Counters>,
    commands: UnboundedReceiver<Command>,
) -> std::io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let worker = Worker {
        queue: BinaryHeap::new(),
        next_seq: 0,
        counters: Arc::clone(&counters),
        slow_task_warn: config.slow_task_warn,
    };

    thread::Builder::new()
        .name(config.thread_name.clone())
        .spawn(move || {
            let _alive = AliveFlag::raise(counters);
            runtime.block_on(worker.run(commands));
        })
}

/// Holds `worker_alive` up for as long as the timer thread runs, unwinding
/// included.
struct AliveFlag(Arc<Counters>);

impl AliveFlag {
    fn raise(counters: Arc<Counters>) -> Self {
        counters.worker_alive.store(true, Ordering::Release);
        Self(counters)
    }
}

impl Drop for AliveFlag {
    fn drop(&mut self) {
        self.0.worker_alive.store(false, Ordering::Release);
    }
}

struct Worker {
    queue: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
    counters: Arc<Counters>,
    slow_task_warn: Duration,
}

impl Worker {
    async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        debug!("timer thread running");

        loop {
            let next_due = self.queue.peek().map(|Reverse(entry)| entry.due);

            tokio::select! {
                biased;

                command = commands.recv() => {
                    if !self.handle_batch(command, &mut commands) {
                        break;
                    }
                    self.fire_next();
                }
                () = sleep_until_due(next_due) => self.fire_next(),
            }
        }

        // Anything still queued or in flight through the channel is dropped.
        commands.close();
        let mut dropped = 0usize;
        for Reverse(entry) in self.queue.drain() {
            entry.state.mark_done();
            dropped += 1;
        }
        while let Ok(command) = commands.try_recv() {
            if let Command::Submit(entry) = command {
                entry.state.mark_done();
                dropped += 1;
            }
        }
        self.counters.queued.fetch_sub(dropped, Ordering::Relaxed);

        debug!(dropped, "timer thread stopped");
    }

    /// Handles `first` and up to `COMMAND_BATCH - 1` commands already
    /// waiting in the channel. Returns `false` once the worker must exit.
    fn handle_batch(
        &mut self,
        first: Option<Command>,
        commands: &mut UnboundedReceiver<Command>,
    ) -> bool {
        let mut next = first;
        let mut handled = 0;
        loop {
            match next {
                Some(Command::Submit(entry)) => self.enqueue(entry),
                Some(Command::Cancel(id)) => self.discard(id),
                Some(Command::Shutdown) | None => return false,
            }
            handled += 1;
            if handled == COMMAND_BATCH {
                return true;
            }
            match commands.try_recv() {
                Ok(command) => next = Some(command),
                // Empty, or closed: a closed channel shows up as `None`
                // on the next `recv`.
                Err(_) => return true,
            }
        }
    }

    /// Adds an entry that is already counted in `queued`.
    fn enqueue(&mut self, mut entry: Entry) {
        if entry.state.is_cancelled() {
            // Cancelled between submission and arrival.
            self.retire(entry);
            return;
        }
        entry.seq = self.next_seq;
        self.next_seq += 1;
        trace!(task_id = %entry.id, "task queued");
        self.queue.push(Reverse(entry));
    }

    /// Drops a cancelled entry from the queue, if it is still there.
    fn discard(&mut self, id: TaskId) {
        let before = self.queue.len();
        self.queue.retain(|Reverse(entry)| {
            if entry.id == id {
                entry.state.mark_done();
                false
            } else {
                true
            }
        });
        let removed = before - self.queue.len();
        if removed > 0 {
            self.counters.queued.fetch_sub(removed, Ordering::Relaxed);
            debug!(task_id = %id, "cancelled task removed from queue");
        }
    }

    fn retire(&self, entry: Entry) {
        entry.state.mark_done();
        self.counters.queued.fetch_sub(1, Ordering::Relaxed);
    }

    /// Pops the earliest entry and runs it if it is due.
    fn fire_next(&mut self) {
        let now = Instant::now();
        let due = self
            .queue
            .peek()
            .is_some_and(|Reverse(entry)| entry.due <= now);
        if !due {
            return;
        }
        let Some(Reverse(mut entry)) = self.queue.pop() else {
            return;
        };
        self.counters.queued.fetch_sub(1, Ordering::Relaxed);

        if entry.state.is_cancelled() {
            entry.state.mark_done();
            return;
        }

        self.counters.active.store(1, Ordering::Relaxed);
        let started = std::time::Instant::now();
        let succeeded = guard(entry.id, &mut entry.job);
        let elapsed = started.elapsed();
        self.counters.active.store(0, Ordering::Relaxed);
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }

        if elapsed >= self.slow_task_warn {
            warn!(
                task_id = %entry.id,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.slow_task_warn.as_secs_f64() * 1000.0,
                "slow scheduled task"
            );
        }
        trace!(task_id = %entry.id, succeeded, "task fired");

        let repeat = match entry.repeat.take() {
            Some(repeat) if !entry.state.is_cancelled() => repeat,
            _ => {
                entry.state.mark_done();
                return;
            }
        };

        let Some((slot, due)) = next_firing(repeat.slot, repeat.period, Instant::now()) else {
            warn!(
                task_id = %entry.id,
                period_secs = repeat.period.as_secs_f64(),
                "next firing is past the end of the clock, retiring repeating task"
            );
            entry.state.mark_done();
            return;
        };
        let skipped = missed_slots(repeat.slot, slot, repeat.period);
        if skipped > 0 {
            warn!(
                task_id = %entry.id,
                skipped,
                "repeating task overran its period, skipping ahead"
            );
        }
        entry.repeat = Some(Repeat { slot, ..repeat });
        entry.due = due;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        self.enqueue(entry);
    }
}

/// Fixed-rate successor of the firing that belonged to `slot`.
///
/// Returns `(next_slot, due)`. Normally that is `slot + period` for both.
/// When the run overran `slot + period`, the next firing happens right away
/// (`due == now`) and `next_slot` jumps to the latest grid point not after
/// `now`, so the slots missed in between are skipped instead of replayed.
///
/// `None` when `slot + period` is not representable: there is no next firing.
pub(crate) fn next_firing(
    slot: Instant,
    period: Duration,
    now: Instant,
) -> Option<(Instant, Instant)> {
    let next = slot.checked_add(period)?;
    if next > now {
        return Some((next, next));
    }
    // `period * behind <= now - next`, so this cannot overflow.
    let behind = (now - next).as_nanos() / period.as_nanos();
    let behind = u32::try_from(behind).unwrap_or(u32::MAX);
    Some((next + period * behind, now))
}

/// Grid points between two consecutive firings that never ran.
fn missed_slots(previous: Instant, next: Instant, period: Duration) -> u64 {
    let slots = (next - previous).as_nanos() / period.as_nanos();
    u64::try_from(slots.saturating_sub(1)).unwrap_or(u64::MAX)
}

async fn sleep_until_due(due: Option<Instant>) {
    match due {
        Some(due) => time::sleep_until(due).await,
        // Empty queue: only a command can wake the worker.
        None => std::future::pending::<()>().await,
    }
}
