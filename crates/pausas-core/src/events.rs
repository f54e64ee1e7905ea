use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimerError;
use crate::timer::TimerMode;

/// Every state change in the scheduler produces an Event.
/// UI layers subscribe to them instead of polling fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    WorkStarted {
        cycle_number: u32,
        work_seconds: u64,
        at: DateTime<Utc>,
    },
    WorkPaused {
        work_seconds_remaining: u64,
        at: DateTime<Utc>,
    },
    WorkResumed {
        work_seconds_remaining: u64,
        at: DateTime<Utc>,
    },
    /// Remaining time was re-derived, by a tick or by visibility recovery.
    Tick {
        mode: TimerMode,
        seconds_remaining: u64,
        at: DateTime<Utc>,
    },
    BreakStarted {
        cycle_number: u32,
        break_seconds: u64,
        exercise_ids: Vec<String>,
        at: DateTime<Utc>,
    },
    ExerciseAdvanced {
        index: usize,
        exercise_id: Option<String>,
        at: DateTime<Utc>,
    },
    BreakCompleted {
        cycle_number: u32,
        at: DateTime<Utc>,
    },
    AutoStartScheduled {
        fires_at: DateTime<Utc>,
    },
    /// Persisted state was read back at startup.
    Restored {
        mode: TimerMode,
        at: DateTime<Utc>,
    },
    Reset {
        at: DateTime<Utc>,
    },
    /// The signed-in user changed; the live cycle now belongs to `user_id`.
    UserChanged {
        user_id: Option<String>,
        at: DateTime<Utc>,
    },
    ErrorRaised {
        error: TimerError,
    },
}
