//! Core error types for pausas-core.
//!
//! Two layers live here. [`CoreError`] is the ordinary `thiserror` hierarchy
//! returned by storage and configuration code. [`TimerError`] is the
//! structured, recoverable value the scheduler records for the UI layer
//! instead of propagating anything out of a transition.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for pausas-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A collaborator (history backend, audio device...) failed
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Row lookup by id found nothing
    #[error("No {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dotted key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Home/config directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid date string
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

// ── Recoverable timer errors ─────────────────────────────────────────

/// Where a recoverable error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Timer,
    History,
    Settings,
    Storage,
}

/// Stable machine-readable error codes surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Persisted snapshot was corrupt or inconsistent; state was reset.
    TimerRestoreFailed,
    /// History session could not be created; the break still runs.
    TimerBreakStartFailed,
    /// History session could not be completed; the cycle still ends.
    TimerBreakCompleteFailed,
    /// Snapshot write failed; at most one tick of durability is lost.
    TimerPersistFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TimerRestoreFailed => "timer_restore_failed",
            ErrorCode::TimerBreakStartFailed => "timer_break_start_failed",
            ErrorCode::TimerBreakCompleteFailed => "timer_break_complete_failed",
            ErrorCode::TimerPersistFailed => "timer_persist_failed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure caught inside the scheduler and kept for display.
///
/// Nothing in the timer core is fatal: the worst case is a lost history
/// record, so every value built here is `recoverable`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct TimerError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    #[serde(rename = "source")]
    pub origin: ErrorSource,
}

impl TimerError {
    pub fn new(code: ErrorCode, origin: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable: true,
            origin,
        }
    }

    /// Wrap an underlying failure, falling back to `fallback` when the cause
    /// renders as an empty string.
    pub fn from_cause(
        code: ErrorCode,
        origin: ErrorSource,
        cause: &dyn std::error::Error,
        fallback: &str,
    ) -> Self {
        let rendered = cause.to_string();
        let message = if rendered.trim().is_empty() {
            fallback.to_string()
        } else {
            rendered
        };
        Self::new(code, origin, message)
    }
}
