//! Wiring shared by the timer commands: stores, collaborators, scheduler.

use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use pausas_core::effects::{AudioPlayer, Effect, EffectRunner, NotificationRelay};
use pausas_core::{
    Catalog, Database, ExerciseRotation, HistoryDb, Settings, SharedSettings, StaticIdentity,
    SystemClock, TimerPersistence, TimerScheduler,
};
use tracing::info;

pub type CliScheduler = TimerScheduler<SystemClock, Rc<Database>>;

/// Rings the terminal bell.
pub struct TerminalBell;

impl AudioPlayer for TerminalBell {
    fn play_break_alarm(&self, volume: f32) {
        if volume > 0.0 {
            ring(2);
        }
    }

    fn play_break_complete(&self, volume: f32) {
        if volume > 0.0 {
            ring(1);
        }
    }
}

fn ring(times: usize) {
    let mut stderr = std::io::stderr();
    for _ in 0..times {
        let _ = stderr.write_all(b"\x07");
    }
    let _ = stderr.flush();
}

/// No desktop notifier in a terminal; schedule requests are only logged.
pub struct LoggedNotifications;

impl NotificationRelay for LoggedNotifications {
    fn schedule_break_notification(&self, delay: Duration, title: &str, body: &str) {
        info!(delay_secs = delay.as_secs(), title, body, "break notification scheduled");
    }

    fn cancel_break_notification(&self) {
        info!("break notification cancelled");
    }
}

/// Build a scheduler over the on-disk database and a runner for its effects.
pub fn open(
    user: Option<&str>,
) -> Result<(CliScheduler, EffectRunner, SharedSettings), Box<dyn std::error::Error>> {
    let settings = SharedSettings::new(Settings::load()?);
    let store = Rc::new(Database::open()?);
    let identity = match user {
        Some(id) => StaticIdentity::user(id),
        None => StaticIdentity::anonymous(),
    };
    let scheduler = TimerScheduler::new(
        SystemClock,
        Box::new(settings.clone()),
        Box::new(identity),
        TimerPersistence::new(Rc::clone(&store)),
        ExerciseRotation::new(Catalog::builtin(), store, user),
    );
    let runner = EffectRunner::new(
        Box::new(HistoryDb::open(user)?),
        Box::new(TerminalBell),
        Box::new(LoggedNotifications),
    );
    Ok((scheduler, runner, settings))
}

/// Run effects inline until no transition asks for more.
pub fn settle(scheduler: &mut CliScheduler, runner: &EffectRunner, mut effects: Vec<Effect>) {
    while !effects.is_empty() {
        effects = runner
            .run_all(&effects)
            .into_iter()
            .flat_map(|outcome| scheduler.apply_outcome(outcome))
            .collect();
    }
}
