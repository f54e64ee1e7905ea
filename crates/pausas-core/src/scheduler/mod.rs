//! Timer scheduler: owns the live cycle and sequences work, break and idle.
//!
//! The scheduler is the only place that mutates [`CycleState`]. It asks the
//! pure engine for every new state, persists the result, notifies
//! subscribers and hands back the side effects the caller must run. It never
//! sleeps: a driver calls [`TimerScheduler::poll`] roughly once per second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Working <-> Paused
//!           |
//!           v
//!         Break -> Idle (-> Working after the auto-start delay)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::effects::{Effect, EffectOutcome};
use crate::error::{ErrorCode, ErrorSource, TimerError};
use crate::events::TimerEvent;
use crate::exercise::{Exercise, ExerciseRotation, DEFAULT_BREAK_EXERCISES};
use crate::identity::{namespace, IdentityProvider};
use crate::storage::{KvStore, Settings, SettingsProvider};
use crate::timer::engine::{self, CycleState, TimerMode};
use crate::timer::persistence::TimerPersistence;
use crate::timer::Clock;

/// Delay between a completed break and the next work phase.
pub const AUTO_START_DELAY_SECS: i64 = 2;

/// Pause catch-up ticks shorter than this are skipped.
const MIN_CATCH_UP_MS: i64 = 500;

type Listener = Box<dyn FnMut(&TimerEvent)>;

/// At most one countdown runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveTick {
    None,
    Work {
        last_tick: DateTime<Utc>,
    },
    Break {
        last_tick: DateTime<Utc>,
        total_seconds: u64,
        per_exercise_seconds: u64,
        /// Exercise thresholds already acted on.
        advanced: u64,
    },
}

/// A break that ended before the recorder returned its session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UnmatchedCompletion {
    actual_duration_seconds: u64,
    completed_at: DateTime<Utc>,
}

/// Read-only view for display layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub work_seconds_remaining: u64,
    pub break_seconds_remaining: u64,
    /// Remaining time of the phase on screen, `H:MM:SS` or `MM:SS`.
    pub formatted_time: String,
    pub work_progress: f64,
    pub break_progress: f64,
    pub current_cycle_number: u32,
    pub cycle_started_at: Option<DateTime<Utc>>,
    pub break_started_at: Option<DateTime<Utc>>,
    pub current_exercise: Option<Exercise>,
    pub exercise_index: usize,
    pub exercises_in_break: usize,
    pub last_error: Option<TimerError>,
    pub auto_start_at: Option<DateTime<Utc>>,
}

/// `3661 -> "1:01:01"`, `59 -> "00:59"`.
pub fn format_clock(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn progress(remaining: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (1.0 - remaining as f64 / total as f64).clamp(0.0, 1.0)
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}

pub struct TimerScheduler<C, S> {
    clock: C,
    settings: Box<dyn SettingsProvider>,
    identity: Box<dyn IdentityProvider>,
    persistence: TimerPersistence<S>,
    rotation: ExerciseRotation<S>,
    state: CycleState,
    tick: ActiveTick,
    auto_start_at: Option<DateTime<Utc>>,
    /// A history session was requested for the current break.
    awaiting_session: bool,
    unmatched_completion: Option<UnmatchedCompletion>,
    last_error: Option<TimerError>,
    restored: bool,
    /// User whose snapshot the live state belongs to.
    bound_user: Option<String>,
    listeners: Vec<Listener>,
}

impl<C: Clock, S: KvStore> TimerScheduler<C, S> {
    /// Starts idle with the configured lengths. Call
    /// [`restore_state`](Self::restore_state) to pick up persisted state.
    pub fn new(
        clock: C,
        settings: Box<dyn SettingsProvider>,
        identity: Box<dyn IdentityProvider>,
        persistence: TimerPersistence<S>,
        rotation: ExerciseRotation<S>,
    ) -> Self {
        let current = settings.settings();
        let bound_user = identity.user_id();
        let state = CycleState {
            work_seconds_remaining: current.work_seconds(),
            break_seconds_remaining: current.break_seconds(),
            ..CycleState::default()
        };
        Self {
            clock,
            settings,
            identity,
            persistence,
            rotation,
            state,
            tick: ActiveTick::None,
            auto_start_at: None,
            awaiting_session: false,
            unmatched_completion: None,
            last_error: None,
            restored: false,
            bound_user,
            listeners: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn mode(&self) -> TimerMode {
        self.state.mode
    }

    pub fn settings(&self) -> Settings {
        self.settings.settings()
    }

    pub fn last_error(&self) -> Option<&TimerError> {
        self.last_error.as_ref()
    }

    /// User the live state is saved under.
    pub fn bound_user(&self) -> Option<&str> {
        self.bound_user.as_deref()
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.state.break_session_id.as_deref()
    }

    pub fn rotation(&self) -> &ExerciseRotation<S> {
        &self.rotation
    }

    pub fn pending_auto_start(&self) -> Option<DateTime<Utc>> {
        self.auto_start_at
    }

    pub fn is_ticking(&self) -> bool {
        self.tick != ActiveTick::None
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let settings = self.settings.settings();
        let break_total = self.break_total(&settings);
        let on_screen = match self.state.mode {
            TimerMode::Break => self.state.break_seconds_remaining,
            _ => self.state.work_seconds_remaining,
        };
        TimerSnapshot {
            mode: self.state.mode,
            work_seconds_remaining: self.state.work_seconds_remaining,
            break_seconds_remaining: self.state.break_seconds_remaining,
            formatted_time: format_clock(on_screen),
            work_progress: progress(self.state.work_seconds_remaining, settings.work_seconds()),
            break_progress: match self.state.mode {
                TimerMode::Break => progress(self.state.break_seconds_remaining, break_total),
                _ => 0.0,
            },
            current_cycle_number: self.state.current_cycle_number,
            cycle_started_at: self.state.cycle_started_at,
            break_started_at: self.state.break_started_at,
            current_exercise: self.rotation.current_exercise().cloned(),
            exercise_index: self.rotation.current_index(),
            exercises_in_break: self.rotation.total_in_break(),
            last_error: self.last_error.clone(),
            auto_start_at: self.auto_start_at,
        }
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: impl FnMut(&TimerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ── Commands ─────────────────────────────────────────────────────
    //
    // Every command first checks whether the signed-in user changed; see
    // `refresh_identity`.

    /// Begin a new work phase from any mode. A break still running is closed
    /// in history with the time actually taken.
    pub fn start_work(&mut self) -> Vec<Effect> {
        self.with_identity(Self::begin_work)
    }

    pub fn pause_work(&mut self) -> Vec<Effect> {
        self.with_identity(Self::pause)
    }

    pub fn resume_work(&mut self) -> Vec<Effect> {
        self.with_identity(Self::resume)
    }

    /// Enter break mode: pick exercises, sound the alarm, open a history
    /// session. The session id arrives later through
    /// [`apply_outcome`](Self::apply_outcome).
    pub fn trigger_break(&mut self) -> Vec<Effect> {
        self.with_identity(Self::enter_break)
    }

    pub fn complete_break(&mut self) -> Vec<Effect> {
        self.with_identity(Self::finish_break)
    }

    /// Back to a fresh idle cycle. Persisted state is removed, not rewritten.
    pub fn reset_all(&mut self) -> Vec<Effect> {
        self.with_identity(Self::reset)
    }

    /// One step of the one-second cadence.
    pub fn poll(&mut self) -> Vec<Effect> {
        self.with_identity(Self::step)
    }

    /// Re-derive the running countdown from its anchor after the process was
    /// suspended or hidden.
    pub fn recalculate_after_tab_visible(&mut self) -> Vec<Effect> {
        self.with_identity(Self::recalculate)
    }

    /// Follow a login, logout or account switch.
    ///
    /// The live cycle belongs to the user it was started for. When the
    /// identity no longer matches, countdowns and any pending auto-start
    /// stop, a signed-out user's snapshot is deleted, and the new user's
    /// saved state is restored. Returns no effects when nothing changed.
    pub fn refresh_identity(&mut self) -> Vec<Effect> {
        let current = self.identity.user_id();
        if current == self.bound_user {
            return Vec::new();
        }
        let now = self.clock.now();
        let settings = self.settings.settings();
        let previous = std::mem::replace(&mut self.bound_user, current.clone());
        info!(
            from = namespace(previous.as_deref()),
            to = namespace(current.as_deref()),
            "user changed"
        );

        if current.is_none() {
            if let Err(e) = self.persistence.clear(previous.as_deref()) {
                warn!(error = %e, "could not clear signed-out user's timer state");
            }
        }

        self.tick = ActiveTick::None;
        self.auto_start_at = None;
        self.awaiting_session = false;
        self.unmatched_completion = None;
        self.last_error = None;
        self.rotation.reset();
        self.state = CycleState {
            work_seconds_remaining: settings.work_seconds(),
            break_seconds_remaining: settings.break_seconds(),
            ..CycleState::default()
        };
        self.emit(TimerEvent::UserChanged {
            user_id: current,
            at: now,
        });

        self.restored = false;
        let mut effects = vec![Effect::CancelBreakNotification];
        effects.extend(self.restore_state());
        effects
    }

    fn with_identity(&mut self, command: fn(&mut Self) -> Vec<Effect>) -> Vec<Effect> {
        let mut effects = self.refresh_identity();
        effects.extend(command(self));
        effects
    }

    fn begin_work(&mut self) -> Vec<Effect> {
        let now = self.clock.now();
        let settings = self.settings.settings();
        let work_seconds = settings.work_seconds();

        let mut effects = Vec::new();
        if self.state.mode == TimerMode::Break {
            let total = self.break_total(&settings);
            let taken = total.saturating_sub(self.state.break_seconds_remaining);
            effects.extend(self.close_break_session(taken, now));
        }

        self.auto_start_at = None;
        self.awaiting_session = false;
        self.rotation.reset();

        let mut state = engine::start(work_seconds, self.state.current_cycle_number, now);
        state.break_seconds_remaining = settings.break_seconds();
        self.state = state;
        self.tick = ActiveTick::Work { last_tick: now };
        self.persist();

        info!(cycle = self.state.current_cycle_number, work_seconds, "work started");
        self.emit(TimerEvent::WorkStarted {
            cycle_number: self.state.current_cycle_number,
            work_seconds,
            at: now,
        });

        effects.extend(notification_effects(&settings, work_seconds));
        effects
    }

    fn pause(&mut self) -> Vec<Effect> {
        if self.state.mode != TimerMode::Working {
            return Vec::new();
        }
        let now = self.clock.now();

        if let ActiveTick::Work { last_tick } = self.tick {
            if (now - last_tick).num_milliseconds() >= MIN_CATCH_UP_MS {
                let result = engine::tick(self.state.work_seconds_remaining, last_tick, now);
                self.state.work_seconds_remaining = result.next_seconds_remaining;
                if result.completed {
                    return self.enter_break();
                }
            }
        }

        self.tick = ActiveTick::None;
        self.state = engine::pause(&self.state);
        self.persist();

        info!(remaining = self.state.work_seconds_remaining, "work paused");
        self.emit(TimerEvent::WorkPaused {
            work_seconds_remaining: self.state.work_seconds_remaining,
            at: now,
        });
        vec![Effect::CancelBreakNotification]
    }

    fn resume(&mut self) -> Vec<Effect> {
        if self.state.mode != TimerMode::Paused {
            return Vec::new();
        }
        let now = self.clock.now();
        let settings = self.settings.settings();

        self.state = engine::resume(&self.state, settings.work_seconds(), now);
        self.tick = ActiveTick::Work { last_tick: now };
        self.persist();

        info!(remaining = self.state.work_seconds_remaining, "work resumed");
        self.emit(TimerEvent::WorkResumed {
            work_seconds_remaining: self.state.work_seconds_remaining,
            at: now,
        });
        notification_effects(&settings, self.state.work_seconds_remaining)
    }

    fn enter_break(&mut self) -> Vec<Effect> {
        let now = self.clock.now();
        let settings = self.settings.settings();
        let break_seconds = settings.break_seconds();

        let mut effects = Vec::new();
        if self.state.mode == TimerMode::Break {
            let taken = self
                .break_total(&settings)
                .saturating_sub(self.state.break_seconds_remaining);
            effects.extend(self.close_break_session(taken, now));
        }

        self.auto_start_at = None;
        self.bind_rotation_user();
        let exercises = self.rotation.select_exercises_for_break(DEFAULT_BREAK_EXERCISES);
        let exercise_ids: Vec<String> = exercises.iter().map(|e| e.id.clone()).collect();
        let per_exercise_seconds = break_seconds / exercises.len().max(1) as u64;

        self.state.mode = TimerMode::Break;
        self.state.cycle_started_at = None;
        self.state.break_seconds_remaining = break_seconds;
        self.state.break_started_at = Some(now);
        self.state.break_session_id = None;
        self.awaiting_session = true;
        self.tick = ActiveTick::Break {
            last_tick: now,
            total_seconds: break_seconds,
            per_exercise_seconds,
            advanced: 0,
        };
        self.persist();

        info!(
            cycle = self.state.current_cycle_number,
            break_seconds,
            exercises = exercise_ids.len(),
            "break started"
        );
        self.emit(TimerEvent::BreakStarted {
            cycle_number: self.state.current_cycle_number,
            break_seconds,
            exercise_ids: exercise_ids.clone(),
            at: now,
        });

        effects.push(Effect::PlayBreakAlarm {
            volume: settings.volume(),
        });
        effects.push(Effect::StartHistorySession {
            exercise_ids,
            planned_duration_seconds: break_seconds,
            started_at: now,
        });
        effects
    }

    fn finish_break(&mut self) -> Vec<Effect> {
        let now = self.clock.now();
        let settings = self.settings.settings();
        let total = self.break_total(&settings);
        let actual_duration_seconds = total.saturating_sub(self.state.break_seconds_remaining);

        let mut effects: Vec<Effect> = self
            .close_break_session(actual_duration_seconds, now)
            .into_iter()
            .collect();
        self.tick = ActiveTick::None;
        effects.push(Effect::PlayBreakComplete {
            volume: settings.volume(),
        });

        self.rotation.reset();
        self.state = engine::complete(&self.state);
        self.state.work_seconds_remaining = settings.work_seconds();

        if settings.auto_start_next_cycle {
            let fires_at = now + Duration::seconds(AUTO_START_DELAY_SECS);
            self.auto_start_at = Some(fires_at);
            self.emit(TimerEvent::AutoStartScheduled { fires_at });
        }
        self.persist();

        info!(cycle = self.state.current_cycle_number, actual_duration_seconds, "break completed");
        self.emit(TimerEvent::BreakCompleted {
            cycle_number: self.state.current_cycle_number,
            at: now,
        });
        effects
    }

    fn reset(&mut self) -> Vec<Effect> {
        let now = self.clock.now();
        let settings = self.settings.settings();

        self.tick = ActiveTick::None;
        self.auto_start_at = None;
        self.awaiting_session = false;
        self.unmatched_completion = None;
        self.rotation.reset();
        self.state = CycleState {
            work_seconds_remaining: settings.work_seconds(),
            break_seconds_remaining: settings.break_seconds(),
            ..CycleState::default()
        };

        if let Err(e) = self.persistence.clear(self.bound_user.as_deref()) {
            self.raise(TimerError::from_cause(
                ErrorCode::TimerPersistFailed,
                ErrorSource::Storage,
                &e,
                "Could not clear saved timer state",
            ));
        }

        info!("timer reset");
        self.emit(TimerEvent::Reset { at: now });
        vec![Effect::CancelBreakNotification]
    }

    fn step(&mut self) -> Vec<Effect> {
        let now = self.clock.now();

        if let Some(deadline) = self.auto_start_at {
            if now >= deadline {
                debug!("auto-starting next cycle");
                return self.begin_work();
            }
        }

        match self.tick {
            ActiveTick::Work { last_tick } => {
                let result = engine::tick(self.state.work_seconds_remaining, last_tick, now);
                self.state.work_seconds_remaining = result.next_seconds_remaining;
                self.tick = ActiveTick::Work { last_tick: now };
                self.persist();
                debug!(remaining = result.next_seconds_remaining, "work tick");
                self.emit(TimerEvent::Tick {
                    mode: TimerMode::Working,
                    seconds_remaining: result.next_seconds_remaining,
                    at: now,
                });
                if result.completed {
                    return self.enter_break();
                }
                Vec::new()
            }
            ActiveTick::Break { last_tick, .. } => {
                let result = engine::tick(self.state.break_seconds_remaining, last_tick, now);
                self.state.break_seconds_remaining = result.next_seconds_remaining;
                self.set_last_tick(now);
                self.advance_exercises(now);
                self.persist();
                debug!(remaining = result.next_seconds_remaining, "break tick");
                self.emit(TimerEvent::Tick {
                    mode: TimerMode::Break,
                    seconds_remaining: result.next_seconds_remaining,
                    at: now,
                });
                if result.completed {
                    return self.finish_break();
                }
                Vec::new()
            }
            ActiveTick::None => {
                if self.state.mode == TimerMode::Idle && self.auto_start_at.is_none() {
                    let settings = self.settings.settings();
                    self.state.work_seconds_remaining = settings.work_seconds();
                    self.state.break_seconds_remaining = settings.break_seconds();
                }
                Vec::new()
            }
        }
    }

    /// Pick up persisted state after a restart. Runs once per scheduler.
    pub fn restore_state(&mut self) -> Vec<Effect> {
        if self.restored {
            return Vec::new();
        }
        self.restored = true;
        let now = self.clock.now();
        let settings = self.settings.settings();
        self.bound_user = self.identity.user_id();
        let user = self.bound_user.clone();
        self.bind_rotation_user();

        let Some(saved) = self.persistence.load(user.as_deref()) else {
            debug!("no saved timer state");
            return Vec::new();
        };
        info!(mode = saved.mode.as_str(), cycle = saved.current_cycle_number, "restoring timer");

        match saved.mode {
            TimerMode::Working => {
                let Some(anchor) = saved.cycle_started_at else {
                    return self.fail_restore(user.as_deref(), &settings);
                };
                self.state = saved;
                self.emit(TimerEvent::Restored {
                    mode: TimerMode::Working,
                    at: now,
                });
                let remaining =
                    engine::recalculate_after_visibility(anchor, settings.work_seconds(), now);
                self.state.work_seconds_remaining = remaining;
                if remaining == 0 {
                    return self.enter_break();
                }
                self.tick = ActiveTick::Work { last_tick: now };
                self.persist();
                notification_effects(&settings, remaining)
            }
            TimerMode::Paused => {
                self.state = saved;
                self.emit(TimerEvent::Restored {
                    mode: TimerMode::Paused,
                    at: now,
                });
                Vec::new()
            }
            TimerMode::Break => {
                let total_seconds = settings.break_seconds();
                let exercises = self.rotation.select_exercises_for_break(DEFAULT_BREAK_EXERCISES);
                let per_exercise_seconds = total_seconds / exercises.len().max(1) as u64;

                let remaining = match saved.break_started_at {
                    Some(anchor) => engine::recalculate_after_visibility(anchor, total_seconds, now),
                    None => saved.break_seconds_remaining.min(total_seconds),
                };
                self.state = saved;
                self.state.break_seconds_remaining = remaining;
                if self.state.break_started_at.is_none() {
                    self.state.break_started_at =
                        Some(now - secs(total_seconds.saturating_sub(remaining)));
                }
                self.tick = ActiveTick::Break {
                    last_tick: now,
                    total_seconds,
                    per_exercise_seconds,
                    advanced: 0,
                };
                self.emit(TimerEvent::Restored {
                    mode: TimerMode::Break,
                    at: now,
                });
                self.advance_exercises(now);
                if remaining == 0 {
                    return self.finish_break();
                }
                self.persist();
                Vec::new()
            }
            TimerMode::Idle => {
                self.state = CycleState {
                    work_seconds_remaining: settings.work_seconds(),
                    break_seconds_remaining: settings.break_seconds(),
                    ..saved
                };
                self.emit(TimerEvent::Restored {
                    mode: TimerMode::Idle,
                    at: now,
                });
                Vec::new()
            }
        }
    }

    fn recalculate(&mut self) -> Vec<Effect> {
        let now = self.clock.now();
        let settings = self.settings.settings();

        match (self.state.mode, self.tick) {
            (TimerMode::Working, ActiveTick::Work { .. }) => {
                let Some(anchor) = self.state.cycle_started_at else {
                    return Vec::new();
                };
                let remaining =
                    engine::recalculate_after_visibility(anchor, settings.work_seconds(), now);
                self.state.work_seconds_remaining = remaining;
                self.tick = ActiveTick::Work { last_tick: now };
                self.persist();
                debug!(remaining, "work recalculated");
                self.emit(TimerEvent::Tick {
                    mode: TimerMode::Working,
                    seconds_remaining: remaining,
                    at: now,
                });
                if remaining == 0 {
                    return self.enter_break();
                }
                Vec::new()
            }
            (TimerMode::Break, ActiveTick::Break { total_seconds, .. }) => {
                let Some(anchor) = self.state.break_started_at else {
                    return Vec::new();
                };
                let remaining = engine::recalculate_after_visibility(anchor, total_seconds, now);
                self.state.break_seconds_remaining = remaining;
                self.set_last_tick(now);
                self.advance_exercises(now);
                self.persist();
                debug!(remaining, "break recalculated");
                self.emit(TimerEvent::Tick {
                    mode: TimerMode::Break,
                    seconds_remaining: remaining,
                    at: now,
                });
                if remaining == 0 {
                    return self.finish_break();
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Feed back the result of an executed effect.
    pub fn apply_outcome(&mut self, outcome: EffectOutcome) -> Vec<Effect> {
        match outcome {
            EffectOutcome::SessionStarted { session_id } => {
                if let Some(done) = self.unmatched_completion.take() {
                    debug!(%session_id, "closing session for an already finished break");
                    return vec![Effect::CompleteHistorySession {
                        session_id,
                        actual_duration_seconds: done.actual_duration_seconds,
                        completed_at: done.completed_at,
                    }];
                }
                if self.state.mode == TimerMode::Break && self.awaiting_session {
                    self.awaiting_session = false;
                    self.state.break_session_id = Some(session_id);
                    self.persist();
                } else {
                    debug!(%session_id, "ignoring session for an abandoned break");
                }
                Vec::new()
            }
            EffectOutcome::SessionCompleted { session_id } => {
                debug!(%session_id, "history session closed");
                self.last_error = None;
                Vec::new()
            }
            EffectOutcome::Failed(error) => {
                if error.code == ErrorCode::TimerBreakStartFailed {
                    self.awaiting_session = false;
                    self.unmatched_completion = None;
                }
                self.raise(error);
                Vec::new()
            }
        }
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn break_total(&self, settings: &Settings) -> u64 {
        match self.tick {
            ActiveTick::Break { total_seconds, .. } => total_seconds,
            _ => settings.break_seconds(),
        }
    }

    /// Close the current break's history session, or remember the
    /// completion until its id arrives.
    fn close_break_session(&mut self, actual_duration_seconds: u64, now: DateTime<Utc>) -> Option<Effect> {
        let effect = match self.state.break_session_id.take() {
            Some(session_id) => Some(Effect::CompleteHistorySession {
                session_id,
                actual_duration_seconds,
                completed_at: now,
            }),
            None if self.awaiting_session => {
                self.unmatched_completion = Some(UnmatchedCompletion {
                    actual_duration_seconds,
                    completed_at: now,
                });
                None
            }
            None => None,
        };
        self.awaiting_session = false;
        effect
    }

    fn set_last_tick(&mut self, now: DateTime<Utc>) {
        match &mut self.tick {
            ActiveTick::Work { last_tick } | ActiveTick::Break { last_tick, .. } => {
                *last_tick = now;
            }
            ActiveTick::None => {}
        }
    }

    /// Move the exercise cursor once for every threshold crossed since the
    /// last advance.
    fn advance_exercises(&mut self, now: DateTime<Utc>) {
        let ActiveTick::Break {
            total_seconds,
            per_exercise_seconds,
            advanced,
            ..
        } = self.tick
        else {
            return;
        };
        if per_exercise_seconds == 0 {
            return;
        }
        let elapsed = total_seconds.saturating_sub(self.state.break_seconds_remaining);
        let expected = elapsed / per_exercise_seconds;
        if expected <= advanced {
            return;
        }
        for _ in advanced..expected {
            if !self.rotation.advance_exercise() {
                break;
            }
            self.emit(TimerEvent::ExerciseAdvanced {
                index: self.rotation.current_index(),
                exercise_id: self.rotation.current_exercise().map(|e| e.id.clone()),
                at: now,
            });
        }
        if let ActiveTick::Break { advanced, .. } = &mut self.tick {
            *advanced = expected;
        }
    }

    fn bind_rotation_user(&mut self) {
        self.rotation.bind_user(self.bound_user.as_deref());
    }

    fn fail_restore(&mut self, user: Option<&str>, settings: &Settings) -> Vec<Effect> {
        warn!("saved working state has no start time");
        if let Err(e) = self.persistence.clear(user) {
            warn!(error = %e, "could not clear unusable timer state");
        }
        self.tick = ActiveTick::None;
        self.state = CycleState {
            work_seconds_remaining: settings.work_seconds(),
            break_seconds_remaining: settings.break_seconds(),
            ..CycleState::default()
        };
        self.raise(TimerError::new(
            ErrorCode::TimerRestoreFailed,
            ErrorSource::Timer,
            "Saved timer state was incomplete and has been discarded",
        ));
        Vec::new()
    }

    fn persist(&mut self) {
        if let Err(e) = self.persistence.save(self.bound_user.as_deref(), &self.state) {
            self.raise(TimerError::from_cause(
                ErrorCode::TimerPersistFailed,
                ErrorSource::Storage,
                &e,
                "Could not save timer state",
            ));
        }
    }

    fn raise(&mut self, error: TimerError) {
        warn!(code = %error.code, message = %error.message, "timer error");
        self.last_error = Some(error.clone());
        self.emit(TimerEvent::ErrorRaised { error });
    }

    fn emit(&mut self, event: TimerEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

fn notification_effects(settings: &Settings, delay_seconds: u64) -> Vec<Effect> {
    if !settings.notifications_enabled {
        return Vec::new();
    }
    vec![Effect::ScheduleBreakNotification {
        delay: std::time::Duration::from_secs(delay_seconds),
    }]
}
