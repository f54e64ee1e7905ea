//! Side effects requested by timer transitions.
//!
//! Transitions are synchronous and return a list of [`Effect`]s. The caller
//! executes them (possibly on another thread) with an [`EffectRunner`] and
//! feeds the resulting [`EffectOutcome`]s back into the scheduler. A slow or
//! failing collaborator therefore never stalls or wedges the state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ErrorCode, ErrorSource, TimerError};
use crate::history::HistoryRecorder;

pub const BREAK_NOTIFICATION_TITLE: &str = "Pausas Activas";
pub const BREAK_NOTIFICATION_BODY: &str = "Time for your active break. Take care of yourself.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    PlayBreakAlarm {
        volume: f32,
    },
    PlayBreakComplete {
        volume: f32,
    },
    StartHistorySession {
        exercise_ids: Vec<String>,
        planned_duration_seconds: u64,
        started_at: DateTime<Utc>,
    },
    CompleteHistorySession {
        session_id: String,
        actual_duration_seconds: u64,
        completed_at: DateTime<Utc>,
    },
    ScheduleBreakNotification {
        #[serde(with = "duration_secs")]
        delay: Duration,
    },
    CancelBreakNotification,
}

/// Result of executing an effect that the scheduler needs to hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectOutcome {
    SessionStarted { session_id: String },
    SessionCompleted { session_id: String },
    Failed(TimerError),
}

/// Fire-and-forget sound playback.
pub trait AudioPlayer: Send {
    fn play_break_alarm(&self, volume: f32);
    fn play_break_complete(&self, volume: f32);
}

/// Fire-and-forget delayed system notification.
pub trait NotificationRelay: Send {
    fn schedule_break_notification(&self, delay: Duration, title: &str, body: &str);
    fn cancel_break_notification(&self);
}

/// Plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioPlayer for SilentAudio {
    fn play_break_alarm(&self, _volume: f32) {}
    fn play_break_complete(&self, _volume: f32) {}
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifications;

impl NotificationRelay for NoNotifications {
    fn schedule_break_notification(&self, _delay: Duration, _title: &str, _body: &str) {}
    fn cancel_break_notification(&self) {}
}

/// Executes effects against injected collaborators.
pub struct EffectRunner {
    history: Box<dyn HistoryRecorder>,
    audio: Box<dyn AudioPlayer>,
    notifications: Box<dyn NotificationRelay>,
}

impl EffectRunner {
    pub fn new(
        history: Box<dyn HistoryRecorder>,
        audio: Box<dyn AudioPlayer>,
        notifications: Box<dyn NotificationRelay>,
    ) -> Self {
        Self {
            history,
            audio,
            notifications,
        }
    }

    /// Run one effect. Never panics on collaborator failure.
    pub fn run(&self, effect: &Effect) -> Option<EffectOutcome> {
        match effect {
            Effect::PlayBreakAlarm { volume } => {
                self.audio.play_break_alarm(*volume);
                None
            }
            Effect::PlayBreakComplete { volume } => {
                self.audio.play_break_complete(*volume);
                None
            }
            Effect::StartHistorySession {
                exercise_ids,
                planned_duration_seconds,
                started_at,
            } => match self
                .history
                .start_session(exercise_ids, *planned_duration_seconds, *started_at)
            {
                Ok(session_id) => {
                    debug!(%session_id, "history session started");
                    Some(EffectOutcome::SessionStarted { session_id })
                }
                Err(e) => {
                    warn!(error = %e, "could not start history session");
                    Some(EffectOutcome::Failed(TimerError::from_cause(
                        ErrorCode::TimerBreakStartFailed,
                        ErrorSource::History,
                        &e,
                        "Could not start the active break",
                    )))
                }
            },
            Effect::CompleteHistorySession {
                session_id,
                actual_duration_seconds,
                completed_at,
            } => match self.history.complete_session(
                session_id,
                *actual_duration_seconds,
                *completed_at,
            ) {
                Ok(()) => Some(EffectOutcome::SessionCompleted {
                    session_id: session_id.clone(),
                }),
                Err(e) => {
                    warn!(%session_id, error = %e, "could not complete history session");
                    Some(EffectOutcome::Failed(TimerError::from_cause(
                        ErrorCode::TimerBreakCompleteFailed,
                        ErrorSource::History,
                        &e,
                        "Could not complete the active break",
                    )))
                }
            },
            Effect::ScheduleBreakNotification { delay } => {
                self.notifications.schedule_break_notification(
                    *delay,
                    BREAK_NOTIFICATION_TITLE,
                    BREAK_NOTIFICATION_BODY,
                );
                None
            }
            Effect::CancelBreakNotification => {
                self.notifications.cancel_break_notification();
                None
            }
        }
    }

    /// Run effects in order, collecting the outcomes worth reporting.
    pub fn run_all(&self, effects: &[Effect]) -> Vec<EffectOutcome> {
        effects.iter().filter_map(|effect| self.run(effect)).collect()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, Result};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorded(Arc<Mutex<Vec<String>>>);

    impl Recorded {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeHistory {
        fail: bool,
        log: Recorded,
    }

    impl HistoryRecorder for FakeHistory {
        fn start_session(&self, ids: &[String], planned: u64, _at: DateTime<Utc>) -> Result<String> {
            if self.fail {
                return Err(CoreError::Unavailable {
                    service: "history".into(),
                    message: "offline".into(),
                });
            }
            self.log.push(format!("start {} {planned}", ids.len()));
            Ok("s-1".into())
        }

        fn complete_session(&self, id: &str, actual: u64, _at: DateTime<Utc>) -> Result<()> {
            if self.fail {
                return Err(CoreError::Unavailable {
                    service: "history".into(),
                    message: "offline".into(),
                });
            }
            self.log.push(format!("complete {id} {actual}"));
            Ok(())
        }
    }

    struct FakeAudio(Recorded);

    impl AudioPlayer for FakeAudio {
        fn play_break_alarm(&self, volume: f32) {
            self.0.push(format!("alarm {volume}"));
        }
        fn play_break_complete(&self, volume: f32) {
            self.0.push(format!("complete {volume}"));
        }
    }

    fn runner(fail: bool) -> (EffectRunner, Recorded) {
        let log = Recorded::default();
        let runner = EffectRunner::new(
            Box::new(FakeHistory { fail, log: log.clone() }),
            Box::new(FakeAudio(log.clone())),
            Box::new(NoNotifications),
        );
        (runner, log)
    }

    #[test]
    fn runs_effects_in_order() {
        let (runner, log) = runner(false);
        let outcomes = runner.run_all(&[
            Effect::PlayBreakAlarm { volume: 0.5 },
            Effect::StartHistorySession {
                exercise_ids: vec!["a".into(), "b".into()],
                planned_duration_seconds: 600,
                started_at: Utc::now(),
            },
        ]);
        assert_eq!(log.entries(), vec!["alarm 0.5", "start 2 600"]);
        assert_eq!(
            outcomes,
            vec![EffectOutcome::SessionStarted {
                session_id: "s-1".into()
            }]
        );
    }

    #[test]
    fn history_failures_become_recoverable_errors() {
        let (runner, _) = runner(true);
        let outcomes = runner.run_all(&[
            Effect::StartHistorySession {
                exercise_ids: vec![],
                planned_duration_seconds: 600,
                started_at: Utc::now(),
            },
            Effect::CompleteHistorySession {
                session_id: "s-1".into(),
                actual_duration_seconds: 600,
                completed_at: Utc::now(),
            },
        ]);
        let codes: Vec<_> = outcomes
            .iter()
            .map(|o| match o {
                EffectOutcome::Failed(e) => {
                    assert!(e.recoverable);
                    e.code
                }
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();
        assert_eq!(
            codes,
            vec![ErrorCode::TimerBreakStartFailed, ErrorCode::TimerBreakCompleteFailed]
        );
    }

    #[test]
    fn effects_serialize_with_type_tag() {
        let json = serde_json::to_value(Effect::ScheduleBreakNotification {
            delay: Duration::from_secs(90),
        })
        .unwrap();
        assert_eq!(json["type"], "schedule_break_notification");
        assert_eq!(json["delay"], 90);
    }
}
