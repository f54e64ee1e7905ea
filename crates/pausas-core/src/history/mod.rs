//! Break history: sessions taken, daily compliance, streaks.

mod store;

pub use store::HistoryDb;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sessions a day is expected to contain unless set otherwise.
pub const DEFAULT_SESSIONS_EXPECTED: u32 = 4;

/// A day counts toward a streak at or above this compliance.
pub const STREAK_THRESHOLD_PERCENT: u32 = 75;

/// One taken break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakSession {
    pub id: String,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub exercise_ids: Vec<String>,
    pub duration_planned_seconds: u64,
    pub duration_actual_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub sessions_expected: u32,
    pub sessions_started: u32,
    pub sessions_completed: u32,
    pub compliance_percent: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStats {
    pub total_days: u32,
    pub average_compliance: u32,
    pub current_streak: u32,
    pub best_streak: u32,
}

/// `round(completed / expected * 100)`, 0 when nothing is expected.
pub fn compliance_percent(completed: u32, expected: u32) -> u32 {
    if expected == 0 {
        return 0;
    }
    ((completed as f64 / expected as f64) * 100.0).round() as u32
}

/// Fold daily records (any order) into streak and average figures.
pub fn compliance_stats(records: &[DailyRecord]) -> ComplianceStats {
    let total_days = records.len() as u32;
    if total_days == 0 {
        return ComplianceStats::default();
    }
    let sum: u64 = records.iter().map(|r| r.compliance_percent as u64).sum();
    let average_compliance = (sum as f64 / total_days as f64).round() as u32;

    let mut sorted: Vec<&DailyRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let current_streak = sorted
        .iter()
        .take_while(|r| r.compliance_percent >= STREAK_THRESHOLD_PERCENT)
        .count() as u32;

    let mut best_streak = 0;
    let mut run = 0;
    for record in &sorted {
        if record.compliance_percent >= STREAK_THRESHOLD_PERCENT {
            run += 1;
            best_streak = best_streak.max(run);
        } else {
            run = 0;
        }
    }

    ComplianceStats {
        total_days,
        average_compliance,
        current_streak,
        best_streak,
    }
}

/// Where break sessions are recorded. Calls may fail (remote backends);
/// the scheduler turns failures into recoverable errors.
pub trait HistoryRecorder: Send {
    /// Returns the new session's id.
    fn start_session(
        &self,
        exercise_ids: &[String],
        planned_duration_seconds: u64,
        started_at: DateTime<Utc>,
    ) -> Result<String>;

    fn complete_session(
        &self,
        session_id: &str,
        actual_duration_seconds: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;
}
