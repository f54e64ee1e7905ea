//! Async driver giving the scheduler its one-second cadence.
//!
//! The scheduler stays on the driver's task; effects are executed on the
//! blocking pool and their outcomes come back over a channel, so a slow
//! history backend never delays a tick.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::Clock;
use crate::effects::{Effect, EffectOutcome, EffectRunner};
use crate::scheduler::{TimerScheduler, TimerSnapshot};
use crate::storage::KvStore;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// User actions accepted while the driver runs.
#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Reset,
    /// The app became visible again after being hidden or suspended.
    Visible,
    Status(oneshot::Sender<TimerSnapshot>),
    Quit,
}

pub struct Driver<C, S> {
    scheduler: TimerScheduler<C, S>,
    runner: Arc<Mutex<EffectRunner>>,
    period: Duration,
}

impl<C: Clock, S: KvStore> Driver<C, S> {
    pub fn new(scheduler: TimerScheduler<C, S>, runner: EffectRunner) -> Self {
        Self {
            scheduler,
            runner: Arc::new(Mutex::new(runner)),
            period: TICK_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn scheduler_mut(&mut self) -> &mut TimerScheduler<C, S> {
        &mut self.scheduler
    }

    /// Restore persisted state, then tick until `Quit` or until every command
    /// sender is dropped. Outcomes of effects still in flight are applied
    /// before the scheduler is handed back.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> TimerScheduler<C, S> {
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let effects = self.scheduler.restore_state();
        self.dispatch(effects, &outcome_tx);
        info!(mode = self.scheduler.mode().as_str(), "timer driver running");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let effects = self.scheduler.poll();
                    self.dispatch(effects, &outcome_tx);
                }
                Some(outcome) = outcome_rx.recv() => {
                    let effects = self.scheduler.apply_outcome(outcome);
                    self.dispatch(effects, &outcome_tx);
                }
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if matches!(command, Command::Quit) {
                        break;
                    }
                    let effects = self.handle(command);
                    self.dispatch(effects, &outcome_tx);
                }
            }
        }

        drop(outcome_tx);
        while let Some(outcome) = outcome_rx.recv().await {
            let effects = self.scheduler.apply_outcome(outcome);
            if effects.is_empty() {
                continue;
            }
            let runner = Arc::clone(&self.runner);
            let outcomes = tokio::task::spawn_blocking(move || {
                runner
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .run_all(&effects)
            })
            .await
            .unwrap_or_default();
            for outcome in outcomes {
                self.scheduler.apply_outcome(outcome);
            }
        }
        info!("timer driver stopped");
        self.scheduler
    }

    fn handle(&mut self, command: Command) -> Vec<Effect> {
        debug!(?command, "driver command");
        match command {
            Command::Start => self.scheduler.start_work(),
            Command::Pause => self.scheduler.pause_work(),
            Command::Resume => self.scheduler.resume_work(),
            Command::Reset => self.scheduler.reset_all(),
            Command::Visible => self.scheduler.recalculate_after_tab_visible(),
            Command::Status(reply) => {
                if reply.send(self.scheduler.snapshot()).is_err() {
                    debug!("status requester went away");
                }
                Vec::new()
            }
            Command::Quit => Vec::new(),
        }
    }

    fn dispatch(&self, effects: Vec<Effect>, outcomes: &mpsc::UnboundedSender<EffectOutcome>) {
        if effects.is_empty() {
            return;
        }
        let runner = Arc::clone(&self.runner);
        let outcomes = outcomes.clone();
        tokio::task::spawn_blocking(move || {
            let runner = runner.lock().unwrap_or_else(|e| e.into_inner());
            for outcome in runner.run_all(&effects) {
                if outcomes.send(outcome).is_err() {
                    warn!("effect outcome dropped, driver stopped");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{NoNotifications, SilentAudio};
    use crate::error::Result;
    use crate::exercise::{Catalog, ExerciseRotation};
    use crate::history::HistoryRecorder;
    use crate::identity::StaticIdentity;
    use crate::storage::{MemoryKvStore, Settings};
    use crate::timer::persistence::TimerPersistence;
    use crate::timer::TimerMode;
    use chrono::{DateTime, TimeZone, Utc};

    /// Wall clock that follows tokio's (paused) time.
    struct TokioClock {
        base: DateTime<Utc>,
        origin: tokio::time::Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap();
            self.base + elapsed
        }
    }

    #[derive(Clone, Default)]
    struct LoggedHistory(Arc<Mutex<Vec<String>>>);

    impl HistoryRecorder for LoggedHistory {
        fn start_session(&self, _ids: &[String], planned: u64, _at: DateTime<Utc>) -> Result<String> {
            self.0.lock().unwrap().push(format!("start {planned}"));
            Ok("session-1".into())
        }

        fn complete_session(&self, id: &str, actual: u64, _at: DateTime<Utc>) -> Result<()> {
            self.0.lock().unwrap().push(format!("complete {id} {actual}"));
            Ok(())
        }
    }

    fn driver(history: LoggedHistory) -> Driver<TokioClock, MemoryKvStore> {
        let store = MemoryKvStore::new();
        let clock = TokioClock {
            base: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            origin: tokio::time::Instant::now(),
        };
        let settings = Settings {
            work_interval_minutes: 60.0,
            ..Settings::default()
        };
        let scheduler = TimerScheduler::new(
            clock,
            Box::new(settings),
            Box::new(StaticIdentity::anonymous()),
            TimerPersistence::new(store.clone()),
            ExerciseRotation::seeded(Catalog::builtin(), store, None, 3),
        );
        let runner = EffectRunner::new(
            Box::new(history),
            Box::new(SilentAudio),
            Box::new(NoNotifications),
        );
        Driver::new(scheduler, runner)
    }

    async fn status(tx: &mpsc::Sender<Command>) -> TimerSnapshot {
        let (reply, rx) = oneshot::channel();
        tx.send(Command::Status(reply)).await.unwrap();
        rx.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn drives_a_full_cycle() {
        let history = LoggedHistory::default();
        let (tx, rx) = mpsc::channel(8);

        let script = async {
            tx.send(Command::Start).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1800)).await;
            let half = status(&tx).await;
            assert_eq!(half.mode, TimerMode::Working);
            assert!((1795..=1805).contains(&half.work_seconds_remaining));

            tokio::time::sleep(Duration::from_secs(1805)).await;
            assert_eq!(status(&tx).await.mode, TimerMode::Break);

            tokio::time::sleep(Duration::from_secs(605)).await;
            let next = status(&tx).await;
            assert_eq!(next.mode, TimerMode::Working);
            assert_eq!(next.current_cycle_number, 2);

            tx.send(Command::Quit).await.unwrap();
        };

        let (scheduler, ()) = tokio::join!(driver(history.clone()).run(rx), script);

        assert_eq!(scheduler.mode(), TimerMode::Working);
        let log = history.0.lock().unwrap().clone();
        assert_eq!(log, vec!["start 600", "complete session-1 600"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_the_countdown() {
        let (tx, rx) = mpsc::channel(8);

        // The script owns the sender; dropping it at the end stops the driver.
        let script = async move {
            tx.send(Command::Start).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            tx.send(Command::Pause).await.unwrap();
            let paused = status(&tx).await;
            tokio::time::sleep(Duration::from_secs(300)).await;
            let later = status(&tx).await;
            assert_eq!(later.mode, TimerMode::Paused);
            assert_eq!(later.work_seconds_remaining, paused.work_seconds_remaining);

            tx.send(Command::Reset).await.unwrap();
            assert_eq!(status(&tx).await.mode, TimerMode::Idle);
        };

        let (scheduler, ()) = tokio::join!(driver(LoggedHistory::default()).run(rx), script);
        assert_eq!(scheduler.mode(), TimerMode::Idle);
    }
}
