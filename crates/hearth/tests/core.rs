//! End-to-end tests for `ServerCore`: the three components wired together
//! the way a game server would use them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use hearth::{
    BuffConfig, BuffValue, Connection, CoreConfig, EffectSource, HearthError, Player, PlayerId,
    SchedulerState, ServerCore, Session, TimerConfig, TimerError,
};

// =========================================================================
// Helpers
// =========================================================================

#[derive(Default)]
struct CountingConnection(AtomicUsize);

impl Connection for CountingConnection {
    fn force_disconnect(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn session(id: u64, name: &str, conn: &Arc<CountingConnection>) -> Arc<Session> {
    Arc::new(Session::new(PlayerId(id), name, conn.clone()))
}

fn heal_buff() -> BuffValue {
    BuffValue::new(EffectSource::Skill { id: 2301002, level: 20 }, 1_000, 300)
}

fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn test_new_core_is_stopped_and_empty() {
    let core: ServerCore = ServerCore::new(CoreConfig::default());

    assert_eq!(core.scheduler().state(), SchedulerState::Stopped);
    assert!(core.players().is_empty());

    let metrics = core.metrics();
    assert_eq!(metrics.players_online, 0);
    assert_eq!(metrics.parked_buffs, 0);
    assert_eq!(metrics.scheduler.total_tasks, 0);
}

#[test]
fn test_start_registers_housekeeping_once() {
    let core: ServerCore = ServerCore::builder().build();

    core.start().unwrap();
    core.start().unwrap();

    assert!(core.scheduler().is_running());
    // One repeating housekeeping task, not two.
    assert_eq!(core.metrics().scheduler.total_tasks, 1);

    core.shutdown();
}

#[test]
fn test_start_rejects_zero_housekeeping_interval() {
    let core: ServerCore = ServerCore::builder()
        .housekeeping_interval(Duration::ZERO)
        .build();

    let err = core.start().unwrap_err();
    assert!(matches!(err, HearthError::Timer(TimerError::ZeroPeriod)));
    // The scheduler this call started is not left running.
    assert!(!core.scheduler().is_running());
}

#[test]
fn test_failed_start_keeps_already_running_scheduler() {
    let core: ServerCore = ServerCore::builder()
        .housekeeping_interval(Duration::ZERO)
        .build();
    core.scheduler().start().unwrap();

    assert!(core.start().is_err());
    assert!(core.scheduler().is_running());

    core.shutdown();
}

#[test]
fn test_shutdown_disconnects_everyone_and_stops_scheduler() {
    let core: ServerCore = ServerCore::builder().build();
    core.start().unwrap();

    let conn = Arc::new(CountingConnection::default());
    core.players().add(session(1, "Alice", &conn));
    core.players().add(session(2, "Bob", &conn));
    core.players().add(session(3, "Carol", &conn));

    assert_eq!(core.shutdown(), 3);
    assert_eq!(conn.0.load(Ordering::SeqCst), 3);
    assert!(core.players().is_empty());
    assert!(!core.scheduler().is_running());
    assert!(core.scheduler().is_terminated());

    // Nothing left to do the second time.
    assert_eq!(core.shutdown(), 0);
    assert_eq!(conn.0.load(Ordering::SeqCst), 3);
}

#[test]
fn test_restart_after_shutdown() {
    let core: ServerCore = ServerCore::builder().build();
    core.start().unwrap();
    core.shutdown();

    core.start().unwrap();
    assert!(core.scheduler().is_running());
    core.shutdown();
}

#[test]
fn test_start_after_external_scheduler_stop_restores_housekeeping() {
    let core: ServerCore = ServerCore::builder()
        .buff_config(BuffConfig {
            snapshot_ttl: Duration::ZERO,
        })
        .housekeeping_interval(Duration::from_millis(20))
        .build();
    core.start().unwrap();

    // Someone holding the shared scheduler stops it, which drops housekeeping.
    core.scheduler().stop();
    core.start().unwrap();
    assert_eq!(core.metrics().scheduler.queued_tasks, 1);

    core.buffs().store_buffs(PlayerId(3), vec![heal_buff()]);
    assert!(wait_until(Duration::from_secs(2), || {
        core.buffs().pending_buffs() == 0
    }));

    core.shutdown();
}

// =========================================================================
// Wiring
// =========================================================================

#[test]
fn test_housekeeping_purges_unclaimed_buffs() {
    let core: ServerCore = ServerCore::builder()
        .buff_config(BuffConfig {
            snapshot_ttl: Duration::from_millis(20),
        })
        .housekeeping_interval(Duration::from_millis(10))
        .build();
    core.start().unwrap();

    core.buffs().store_buffs(PlayerId(7), vec![heal_buff()]);
    assert_eq!(core.metrics().parked_buffs, 1);

    assert!(wait_until(Duration::from_secs(2), || {
        core.buffs().pending_buffs() == 0
    }));
    assert_eq!(core.buffs().take_buffs(PlayerId(7)), None);

    core.shutdown();
}

#[test]
fn test_channel_change_handoff() {
    let core: ServerCore = ServerCore::builder().build();
    core.start().unwrap();
    let conn = Arc::new(CountingConnection::default());

    // Leaving channel: park the buffs and drop the session.
    let alice = session(1, "Alice", &conn);
    core.players().add(alice);
    core.buffs().store_buffs(PlayerId(1), vec![heal_buff()]);
    assert!(core.players().remove(PlayerId(1)).is_some());

    // Arriving on the new channel: register again and reclaim.
    core.players().add(session(1, "Alice", &conn));
    let restored = core.buffs().take_buffs(PlayerId(1)).unwrap();
    assert_eq!(restored, vec![heal_buff()]);
    assert_eq!(core.buffs().take_buffs(PlayerId(1)), None);
    assert!(core.players().get_by_name("alice").is_some());

    core.shutdown();
}

#[test]
fn test_scheduled_task_reaches_registries() {
    let core: ServerCore = ServerCore::builder().build();
    core.start().unwrap();
    let conn = Arc::new(CountingConnection::default());
    core.players().add(session(5, "Dave", &conn));

    let players = Arc::clone(core.players());
    let (tx, rx) = mpsc::channel();
    core.scheduler()
        .schedule_once(
            move || {
                let found = players.get_by_name("DAVE").map(|p| p.name().to_owned());
                let _ = tx.send(found);
            },
            Duration::from_millis(5),
        )
        .unwrap();

    let found = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(found.as_deref(), Some("Dave"));

    core.shutdown();
}

#[test]
fn test_custom_config_reaches_scheduler() {
    let config = CoreConfig {
        timer: TimerConfig {
            thread_name: "world-timer".into(),
            ..TimerConfig::default()
        },
        ..CoreConfig::default()
    };
    let core: ServerCore = ServerCore::builder().config(config).build();

    assert_eq!(core.scheduler().config().thread_name, "world-timer");
}

#[test]
fn test_metrics_serialize() {
    let core: ServerCore = ServerCore::builder().build();
    core.buffs().store_buffs(PlayerId(1), vec![heal_buff()]);

    let json = serde_json::to_value(core.metrics()).unwrap();
    assert_eq!(json["parked_buffs"], 1);
    assert_eq!(json["players_online"], 0);
    assert!(json["scheduler"].is_object());
}
