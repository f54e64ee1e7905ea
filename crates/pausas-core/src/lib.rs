//! # Pausas Activas Core Library
//!
//! Core logic for the Pausas Activas workplace wellness timer: a recurring
//! work/break cycle that prompts short physical exercises and tracks daily
//! compliance. The `pausas` CLI binary is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: pure wall-clock state transitions; elapsed time is
//!   always derived from an anchor timestamp, never from counting ticks
//! - **Scheduler**: owns the live cycle, persists it after every change and
//!   returns side effects for the caller to run
//! - **Driver**: async tokio loop giving the scheduler a one-second cadence
//! - **Storage**: SQLite key-value and history tables, TOML settings
//! - **Exercises**: built-in catalog and recent-history aware rotation
//!
//! ## Key Components
//!
//! - [`TimerScheduler`]: the state machine callers talk to
//! - [`EffectRunner`]: executes [`Effect`]s against injected collaborators
//! - [`HistoryDb`]: break sessions and compliance statistics
//! - [`Settings`]: user configuration

pub mod effects;
pub mod error;
pub mod events;
pub mod exercise;
pub mod history;
pub mod identity;
pub mod scheduler;
pub mod storage;
pub mod timer;

pub use effects::{
    AudioPlayer, Effect, EffectOutcome, EffectRunner, NoNotifications, NotificationRelay,
    SilentAudio,
};
pub use error::{ConfigError, CoreError, DatabaseError, ErrorCode, ErrorSource, TimerError, ValidationError};
pub use events::TimerEvent;
pub use exercise::{Catalog, Exercise, ExerciseCategory, ExerciseRotation};
pub use history::{BreakSession, ComplianceStats, DailyRecord, HistoryDb, HistoryRecorder};
pub use identity::{IdentityProvider, SharedIdentity, StaticIdentity};
pub use scheduler::{TimerScheduler, TimerSnapshot};
pub use storage::{Database, KvStore, MemoryKvStore, Settings, SettingsProvider, SharedSettings};
pub use timer::{Clock, CycleState, ManualClock, SystemClock, TimerMode, TimerPersistence};
