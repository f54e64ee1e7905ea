//! Integration tests for restart recovery.
//!
//! Runs the scheduler against an on-disk SQLite file, drops it mid-cycle as a
//! process exit would, and checks what a fresh scheduler recovers, including
//! the break history written along the way.

use std::path::Path;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use pausas_core::effects::{Effect, EffectRunner, NoNotifications, SilentAudio};
use pausas_core::timer::timer_state_key;
use pausas_core::{
    Catalog, Database, ErrorCode, ExerciseRotation, HistoryDb, KvStore, ManualClock, Settings,
    StaticIdentity, TimerMode, TimerPersistence, TimerScheduler,
};

type DiskScheduler = TimerScheduler<ManualClock, Rc<Database>>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap()
}

fn settings() -> Settings {
    Settings {
        work_interval_minutes: 60.0,
        break_duration_minutes: 8.0,
        ..Settings::default()
    }
}

/// A fresh "process": new connections, new scheduler, nothing in memory.
fn boot(path: &Path, clock: &ManualClock, seed: u64) -> (DiskScheduler, EffectRunner) {
    let store = Rc::new(Database::open_at(path).unwrap());
    let scheduler = TimerScheduler::new(
        clock.clone(),
        Box::new(settings()),
        Box::new(StaticIdentity::user("maria")),
        TimerPersistence::new(Rc::clone(&store)),
        ExerciseRotation::seeded(Catalog::builtin(), store, Some("maria"), seed),
    );
    let runner = EffectRunner::new(
        Box::new(HistoryDb::new(Database::open_at(path).unwrap(), Some("maria"))),
        Box::new(SilentAudio),
        Box::new(NoNotifications),
    );
    (scheduler, runner)
}

fn settle(scheduler: &mut DiskScheduler, runner: &EffectRunner, mut effects: Vec<Effect>) {
    while !effects.is_empty() {
        effects = runner
            .run_all(&effects)
            .into_iter()
            .flat_map(|outcome| scheduler.apply_outcome(outcome))
            .collect();
    }
}

#[test]
fn test_restart_during_work_resumes_from_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pausas.db");
    let clock = ManualClock::new(t0());

    let (mut first, runner) = boot(&path, &clock, 1);
    let effects = first.start_work();
    settle(&mut first, &runner, effects);
    clock.advance_secs(5);
    first.poll();
    drop(first);

    // Closed for 20 minutes; no ticks ran.
    clock.advance_secs(20 * 60);
    let (mut second, runner) = boot(&path, &clock, 2);
    let effects = second.restore_state();
    settle(&mut second, &runner, effects);

    assert_eq!(second.mode(), TimerMode::Working);
    assert_eq!(second.state().work_seconds_remaining, 3600 - 5 - 20 * 60);
    assert_eq!(second.state().current_cycle_number, 1);
}

#[test]
fn test_restart_after_work_expired_records_break_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pausas.db");
    let clock = ManualClock::new(t0());

    let (mut first, runner) = boot(&path, &clock, 1);
    let effects = first.start_work();
    settle(&mut first, &runner, effects);
    drop(first);

    clock.advance_secs(2 * 3600);
    let (mut second, runner) = boot(&path, &clock, 2);
    let effects = second.restore_state();
    settle(&mut second, &runner, effects);

    assert_eq!(second.mode(), TimerMode::Break);
    assert_eq!(second.state().current_cycle_number, 1);
    assert_eq!(second.state().break_seconds_remaining, 480);
    let session_id = second.current_session_id().unwrap().to_string();

    let history = HistoryDb::new(Database::open_at(&path).unwrap(), Some("maria"));
    let session = history.session(&session_id).unwrap().unwrap();
    assert!(!session.completed);
    assert_eq!(session.duration_planned_seconds, 480);
    assert_eq!(session.exercise_ids.len(), 4);

    // Restart once more mid-break: the session id survives with the snapshot.
    clock.advance_secs(100);
    second.poll();
    drop(second);
    clock.advance_secs(60);
    let (mut third, runner) = boot(&path, &clock, 3);
    let effects = third.restore_state();
    settle(&mut third, &runner, effects);
    assert_eq!(third.mode(), TimerMode::Break);
    assert_eq!(third.state().break_seconds_remaining, 480 - 160);
    assert_eq!(third.current_session_id(), Some(session_id.as_str()));

    clock.advance_secs(320);
    let effects = third.poll();
    settle(&mut third, &runner, effects);
    assert_eq!(third.mode(), TimerMode::Idle);

    let session = history.session(&session_id).unwrap().unwrap();
    assert!(session.completed);
    assert_eq!(session.duration_actual_seconds, 480);
    let record = history.daily_record(t0().date_naive()).unwrap();
    assert_eq!(record.sessions_started, 1);
    assert_eq!(record.sessions_completed, 1);
    assert_eq!(record.compliance_percent, 25);
}

#[test]
fn test_restart_after_break_expired_lands_idle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pausas.db");
    let clock = ManualClock::new(t0());

    let (mut first, runner) = boot(&path, &clock, 1);
    let effects = first.trigger_break();
    settle(&mut first, &runner, effects);
    drop(first);

    clock.advance_secs(3600);
    let (mut second, runner) = boot(&path, &clock, 2);
    let effects = second.restore_state();
    settle(&mut second, &runner, effects);

    assert_eq!(second.mode(), TimerMode::Idle);
    assert_eq!(second.state().work_seconds_remaining, 3600);
    let history = HistoryDb::new(Database::open_at(&path).unwrap(), Some("maria"));
    let sessions = history.sessions_by_date(t0().date_naive()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].completed);
}

#[test]
fn test_reset_leaves_nothing_to_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pausas.db");
    let clock = ManualClock::new(t0());

    let (mut first, runner) = boot(&path, &clock, 1);
    let effects = first.start_work();
    settle(&mut first, &runner, effects);
    let effects = first.reset_all();
    settle(&mut first, &runner, effects);
    drop(first);

    let db = Database::open_at(&path).unwrap();
    assert!(db.get(&timer_state_key(Some("maria"))).unwrap().is_none());

    let (mut second, _) = boot(&path, &clock, 2);
    assert!(second.restore_state().is_empty());
    assert_eq!(second.mode(), TimerMode::Idle);
}

#[test]
fn test_corrupt_snapshot_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pausas.db");
    let clock = ManualClock::new(t0());

    {
        let db = Database::open_at(&path).unwrap();
        db.set(&timer_state_key(Some("maria")), r#"{"mode":"working","cycleStartedAt":null,"workSecondsRemaining":100,"breakSecondsRemaining":0,"currentCycleNumber":2}"#)
            .unwrap();
    }

    let (mut scheduler, _) = boot(&path, &clock, 1);
    scheduler.restore_state();

    assert_eq!(scheduler.mode(), TimerMode::Idle);
    assert_eq!(
        scheduler.last_error().map(|e| e.code),
        Some(ErrorCode::TimerRestoreFailed)
    );
    let db = Database::open_at(&path).unwrap();
    assert!(db.get(&timer_state_key(Some("maria"))).unwrap().is_none());
}

#[test]
fn test_exercise_window_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pausas.db");
    let clock = ManualClock::new(t0());

    let (mut first, runner) = boot(&path, &clock, 1);
    let effects = first.trigger_break();
    settle(&mut first, &runner, effects);
    let shown: Vec<String> = first
        .rotation()
        .current_break_exercises()
        .iter()
        .map(|e| e.id.clone())
        .collect();
    drop(first);

    let (second, _) = boot(&path, &clock, 2);
    assert_eq!(second.rotation().recent_ids(), shown.as_slice());
}
