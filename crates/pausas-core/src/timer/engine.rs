//! Timer engine: pure state transitions.
//!
//! The engine never reads a clock and never sleeps. Each function takes the
//! current instant explicitly and returns a new [`CycleState`] (or a
//! [`TickResult`]); the scheduler decides when to call them.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Working -> (Paused -> Working)* -> Break -> Idle
//! ```
//!
//! Elapsed work time is always `now - cycle_started_at`. Pausing does not
//! keep an accumulator: [`resume`] re-anchors the start so the same formula
//! keeps working afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Idle,
    Working,
    Paused,
    Break,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Idle => "idle",
            TimerMode::Working => "working",
            TimerMode::Paused => "paused",
            TimerMode::Break => "break",
        }
    }
}

/// Canonical timer snapshot. Also the persisted record layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CycleState {
    pub mode: TimerMode,
    pub work_seconds_remaining: u64,
    pub break_seconds_remaining: u64,
    /// Working anchor. Kept through a pause for audit, not authoritative there.
    pub cycle_started_at: Option<DateTime<Utc>>,
    pub current_cycle_number: u32,
    /// Break anchor; absent in snapshots written before breaks were anchored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_started_at: Option<DateTime<Utc>>,
    /// History session opened for the current break, once the recorder answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_session_id: Option<String>,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickResult {
    pub next_seconds_remaining: u64,
    pub completed: bool,
    /// Always at least 1.
    pub elapsed_seconds: u64,
}

/// Convert a possibly-garbage seconds value to a usable count.
///
/// Negative, NaN and infinite inputs become zero; everything else is floored.
pub fn clamp_seconds(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    if value >= u64::MAX as f64 {
        return u64::MAX;
    }
    value.floor() as u64
}

pub fn start(total_work_seconds: u64, prior_cycle_number: u32, now: DateTime<Utc>) -> CycleState {
    CycleState {
        mode: TimerMode::Working,
        work_seconds_remaining: total_work_seconds,
        break_seconds_remaining: 0,
        cycle_started_at: Some(now),
        current_cycle_number: prior_cycle_number.saturating_add(1),
        break_started_at: None,
        break_session_id: None,
    }
}

/// The caller must have committed a fresh tick first: the remaining value is
/// kept as-is.
pub fn pause(state: &CycleState) -> CycleState {
    CycleState {
        mode: TimerMode::Paused,
        ..state.clone()
    }
}

pub fn resume(state: &CycleState, total_work_seconds: u64, now: DateTime<Utc>) -> CycleState {
    let elapsed_so_far = total_work_seconds.saturating_sub(state.work_seconds_remaining);
    CycleState {
        mode: TimerMode::Working,
        cycle_started_at: Some(now - seconds(elapsed_so_far)),
        ..state.clone()
    }
}

pub fn complete(state: &CycleState) -> CycleState {
    CycleState {
        mode: TimerMode::Idle,
        cycle_started_at: None,
        break_seconds_remaining: 0,
        break_started_at: None,
        break_session_id: None,
        ..state.clone()
    }
}

/// Advance a countdown by the real time since `last_tick`.
///
/// Elapsed seconds are rounded to the nearest second with a floor of one, so
/// a callback that fires early still makes progress.
pub fn tick(seconds_remaining: u64, last_tick: DateTime<Utc>, now: DateTime<Utc>) -> TickResult {
    let elapsed_ms = (now - last_tick).num_milliseconds();
    let rounded = (elapsed_ms.saturating_add(500)).div_euclid(1000);
    let elapsed_seconds = rounded.max(1) as u64;
    let next_seconds_remaining = seconds_remaining.saturating_sub(elapsed_seconds);
    TickResult {
        next_seconds_remaining,
        completed: next_seconds_remaining == 0,
        elapsed_seconds,
    }
}

/// Re-derive the remaining time from an absolute anchor.
///
/// Interval callbacks do not fire reliably while the process is suspended, so
/// this is the authoritative value whenever the app comes back.
pub fn recalculate_after_visibility(
    anchor: DateTime<Utc>,
    total_seconds: u64,
    now: DateTime<Utc>,
) -> u64 {
    let elapsed_ms = (now - anchor).num_milliseconds().max(0);
    let elapsed_seconds = (elapsed_ms / 1000) as u64;
    total_seconds.saturating_sub(elapsed_seconds)
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}
