//! SQLite-backed history.
//!
//! Daily records are recomputed from the session rows whenever a session
//! starts or completes, so the two tables never disagree. Every row belongs
//! to one user namespace; a `HistoryDb` only sees its own.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{
    compliance_percent, compliance_stats, BreakSession, ComplianceStats, DailyRecord,
    HistoryRecorder, DEFAULT_SESSIONS_EXPECTED,
};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::identity::namespace;
use crate::storage::Database;

pub struct HistoryDb {
    db: Database,
    user: String,
}

impl HistoryDb {
    /// History of `user_id` (anonymous when `None`) stored in `db`.
    pub fn new(db: Database, user_id: Option<&str>) -> Self {
        Self {
            db,
            user: namespace(user_id).to_string(),
        }
    }

    /// Open the default on-disk database.
    pub fn open(user_id: Option<&str>) -> Result<Self> {
        Ok(Self::new(Database::open()?, user_id))
    }

    /// Anonymous history in a throwaway database.
    pub fn open_memory() -> Result<Self> {
        Ok(Self::new(Database::open_memory()?, None))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Namespace the rows are read from and written to.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Insert a new, not yet completed session and return it.
    pub fn create_session(
        &self,
        exercise_ids: &[String],
        planned_duration_seconds: u64,
        started_at: DateTime<Utc>,
    ) -> Result<BreakSession> {
        let session = BreakSession {
            id: uuid::Uuid::new_v4().to_string(),
            date: started_at.date_naive(),
            started_at,
            completed_at: None,
            completed: false,
            exercise_ids: exercise_ids.to_vec(),
            duration_planned_seconds: planned_duration_seconds,
            duration_actual_seconds: 0,
        };
        self.db.conn().execute(
            "INSERT INTO break_sessions
                (id, user_id, date, started_at, completed_at, completed, exercise_ids,
                 duration_planned_seconds, duration_actual_seconds)
             VALUES (?1, ?2, ?3, ?4, NULL, 0, ?5, ?6, 0)",
            params![
                session.id,
                self.user,
                session.date.to_string(),
                session.started_at.to_rfc3339(),
                serde_json::to_string(&session.exercise_ids)?,
                session.duration_planned_seconds as i64,
            ],
        )?;
        self.recompute_daily_record(session.date)?;
        debug!(id = %session.id, "break session created");
        Ok(session)
    }

    /// Mark a session completed and return the updated row.
    pub fn finish_session(
        &self,
        session_id: &str,
        actual_duration_seconds: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<BreakSession> {
        let updated = self.db.conn().execute(
            "UPDATE break_sessions
             SET completed = 1, completed_at = ?2, duration_actual_seconds = ?3
             WHERE id = ?1 AND user_id = ?4",
            params![
                session_id,
                completed_at.to_rfc3339(),
                actual_duration_seconds as i64,
                self.user,
            ],
        )?;
        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "break session",
                id: session_id.to_string(),
            }
            .into());
        }
        let session = self.session(session_id)?.ok_or_else(|| DatabaseError::NotFound {
            entity: "break session",
            id: session_id.to_string(),
        })?;
        self.recompute_daily_record(session.date)?;
        Ok(session)
    }

    pub fn session(&self, session_id: &str) -> Result<Option<BreakSession>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, date, started_at, completed_at, completed, exercise_ids,
                    duration_planned_seconds, duration_actual_seconds
             FROM break_sessions WHERE id = ?1 AND user_id = ?2",
        )?;
        let row = stmt
            .query_row(params![session_id, self.user], raw_session)
            .optional()?;
        row.map(RawSession::into_session).transpose()
    }

    /// Sessions started on `date`, oldest first.
    pub fn sessions_by_date(&self, date: NaiveDate) -> Result<Vec<BreakSession>> {
        self.sessions_between(date, date)
    }

    pub fn sessions_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<BreakSession>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, date, started_at, completed_at, completed, exercise_ids,
                    duration_planned_seconds, duration_actual_seconds
             FROM break_sessions
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY started_at ASC",
        )?;
        let rows = stmt.query_map(
            params![self.user, from.to_string(), to.to_string()],
            raw_session,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// Daily records in `[from, to]`, oldest first. Days without any
    /// activity have no record.
    pub fn daily_records(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyRecord>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT date, sessions_expected, sessions_started, sessions_completed, compliance_percent
             FROM daily_records
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![self.user, from.to_string(), to.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (date, expected, started, completed, percent) = row?;
            records.push(DailyRecord {
                date: parse_date(&date)?,
                sessions_expected: expected,
                sessions_started: started,
                sessions_completed: completed,
                compliance_percent: percent,
            });
        }
        Ok(records)
    }

    /// The record for one day, synthesized empty when there is none yet.
    pub fn daily_record(&self, date: NaiveDate) -> Result<DailyRecord> {
        Ok(self
            .daily_records(date, date)?
            .into_iter()
            .next()
            .unwrap_or(DailyRecord {
                date,
                sessions_expected: DEFAULT_SESSIONS_EXPECTED,
                sessions_started: 0,
                sessions_completed: 0,
                compliance_percent: 0,
            }))
    }

    /// Change how many breaks a day should contain and recompute compliance.
    pub fn set_expected_sessions(&self, date: NaiveDate, expected: u32) -> Result<DailyRecord> {
        self.db.conn().execute(
            "INSERT INTO daily_records (user_id, date, sessions_expected)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, date) DO UPDATE SET sessions_expected = excluded.sessions_expected",
            params![self.user, date.to_string(), expected],
        )?;
        self.recompute_daily_record(date)?;
        self.daily_record(date)
    }

    /// Streaks and average over the `days` days ending at `today`.
    pub fn compliance_stats(&self, days: u32, today: NaiveDate) -> Result<ComplianceStats> {
        let span = i64::from(days.max(1)) - 1;
        let from = today - Duration::days(span);
        Ok(compliance_stats(&self.daily_records(from, today)?))
    }

    fn recompute_daily_record(&self, date: NaiveDate) -> Result<()> {
        let day = date.to_string();
        let conn = self.db.conn();
        let (started, completed): (u32, u32) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(completed), 0) FROM break_sessions
             WHERE user_id = ?1 AND date = ?2",
            params![self.user, day],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO daily_records (user_id, date, sessions_expected)
             VALUES (?1, ?2, ?3)",
            params![self.user, day, DEFAULT_SESSIONS_EXPECTED],
        )?;
        let expected: u32 = conn.query_row(
            "SELECT sessions_expected FROM daily_records WHERE user_id = ?1 AND date = ?2",
            params![self.user, day],
            |row| row.get(0),
        )?;
        conn.execute(
            "UPDATE daily_records
             SET sessions_started = ?3, sessions_completed = ?4, compliance_percent = ?5
             WHERE user_id = ?1 AND date = ?2",
            params![
                self.user,
                day,
                started,
                completed,
                compliance_percent(completed, expected)
            ],
        )?;
        Ok(())
    }
}

impl HistoryRecorder for HistoryDb {
    fn start_session(
        &self,
        exercise_ids: &[String],
        planned_duration_seconds: u64,
        started_at: DateTime<Utc>,
    ) -> Result<String> {
        Ok(self
            .create_session(exercise_ids, planned_duration_seconds, started_at)?
            .id)
    }

    fn complete_session(
        &self,
        session_id: &str,
        actual_duration_seconds: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.finish_session(session_id, actual_duration_seconds, completed_at)?;
        Ok(())
    }
}

struct RawSession {
    id: String,
    date: String,
    started_at: String,
    completed_at: Option<String>,
    completed: bool,
    exercise_ids: String,
    planned: i64,
    actual: i64,
}

fn raw_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
    Ok(RawSession {
        id: row.get(0)?,
        date: row.get(1)?,
        started_at: row.get(2)?,
        completed_at: row.get(3)?,
        completed: row.get(4)?,
        exercise_ids: row.get(5)?,
        planned: row.get(6)?,
        actual: row.get(7)?,
    })
}

impl RawSession {
    fn into_session(self) -> Result<BreakSession> {
        Ok(BreakSession {
            date: parse_date(&self.date)?,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            completed: self.completed,
            exercise_ids: serde_json::from_str(&self.exercise_ids)?,
            duration_planned_seconds: self.planned.max(0) as u64,
            duration_actual_seconds: self.actual.max(0) as u64,
            id: self.id,
        })
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(value.to_string()).into())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            DatabaseError::QueryFailed(format!("bad timestamp '{value}': {e}")).into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0).unwrap()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_and_finish_session() {
        let history = HistoryDb::open_memory().unwrap();
        let session = history
            .create_session(&ids(&["vis-blink", "neck-tilt"]), 600, at(4, 10))
            .unwrap();
        assert!(!session.completed);
        assert_eq!(session.date, NaiveDate::from_ymd_opt(2026, 5, 4).unwrap());

        let done = history.finish_session(&session.id, 590, at(4, 11)).unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(at(4, 11)));
        assert_eq!(done.duration_actual_seconds, 590);
        assert_eq!(done.exercise_ids, ids(&["vis-blink", "neck-tilt"]));
    }

    #[test]
    fn finishing_unknown_session_fails() {
        let history = HistoryDb::open_memory().unwrap();
        assert!(history.finish_session("missing", 10, at(4, 10)).is_err());
    }

    #[test]
    fn daily_record_tracks_compliance() {
        let history = HistoryDb::open_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        for hour in [9, 11, 13] {
            let s = history.create_session(&ids(&["a"]), 600, at(4, hour)).unwrap();
            if hour != 13 {
                history.finish_session(&s.id, 600, at(4, hour)).unwrap();
            }
        }
        let record = history.daily_record(day).unwrap();
        assert_eq!(record.sessions_expected, 4);
        assert_eq!(record.sessions_started, 3);
        assert_eq!(record.sessions_completed, 2);
        assert_eq!(record.compliance_percent, 50);

        let record = history.set_expected_sessions(day, 2).unwrap();
        assert_eq!(record.compliance_percent, 100);
    }

    #[test]
    fn empty_day_record_is_synthesized() {
        let history = HistoryDb::open_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 5, 9).unwrap();
        let record = history.daily_record(day).unwrap();
        assert_eq!(record.sessions_started, 0);
        assert!(history.daily_records(day, day).unwrap().is_empty());
    }

    #[test]
    fn sessions_by_date_filters_and_orders() {
        let history = HistoryDb::open_memory().unwrap();
        history.create_session(&ids(&["b"]), 600, at(5, 14)).unwrap();
        history.create_session(&ids(&["a"]), 600, at(5, 9)).unwrap();
        history.create_session(&ids(&["c"]), 600, at(6, 9)).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 5, 5).unwrap();
        let sessions = history.sessions_by_date(day).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].exercise_ids, ids(&["a"]));
    }

    #[test]
    fn compliance_stats_over_window() {
        let history = HistoryDb::open_memory().unwrap();
        for day in 1..=3 {
            for hour in [9, 11, 13, 15] {
                let s = history.create_session(&ids(&["x"]), 600, at(day, hour)).unwrap();
                history.finish_session(&s.id, 600, at(day, hour)).unwrap();
            }
        }
        let today = NaiveDate::from_ymd_opt(2026, 5, 3).unwrap();
        let stats = history.compliance_stats(7, today).unwrap();
        assert_eq!(stats.total_days, 3);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.average_compliance, 100);

        let stats = history.compliance_stats(1, today).unwrap();
        assert_eq!(stats.total_days, 1);
    }

    #[test]
    fn users_do_not_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pausas.db");
        let ana = HistoryDb::new(Database::open_at(&path).unwrap(), Some("ana"));
        let ben = HistoryDb::new(Database::open_at(&path).unwrap(), Some("ben"));
        let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();

        for hour in [9, 11] {
            let s = ana.create_session(&ids(&["a"]), 600, at(4, hour)).unwrap();
            ana.finish_session(&s.id, 600, at(4, hour)).unwrap();
        }
        let theirs = ben.create_session(&ids(&["b"]), 600, at(4, 10)).unwrap();
        ben.set_expected_sessions(day, 2).unwrap();

        assert_eq!(ana.sessions_by_date(day).unwrap().len(), 2);
        assert_eq!(ben.sessions_by_date(day).unwrap().len(), 1);
        assert_eq!(ana.daily_record(day).unwrap().sessions_expected, 4);
        assert_eq!(ana.daily_record(day).unwrap().compliance_percent, 50);
        assert_eq!(ben.daily_record(day).unwrap().sessions_started, 1);
        assert_eq!(ben.daily_record(day).unwrap().compliance_percent, 0);

        // Session ids do not cross namespaces either.
        assert!(ana.session(&theirs.id).unwrap().is_none());
        assert!(ana.finish_session(&theirs.id, 600, at(4, 11)).is_err());
        assert!(!ben.session(&theirs.id).unwrap().unwrap().completed);

        let anonymous = HistoryDb::new(Database::open_at(&path).unwrap(), None);
        assert_eq!(anonymous.user(), "anonymous");
        assert!(anonymous.sessions_by_date(day).unwrap().is_empty());
    }

    #[test]
    fn recorder_trait_returns_session_id() {
        let history = HistoryDb::open_memory().unwrap();
        let recorder: &dyn HistoryRecorder = &history;
        let id = recorder.start_session(&ids(&["x"]), 300, at(7, 9)).unwrap();
        recorder.complete_session(&id, 300, at(7, 9)).unwrap();
        assert!(history.session(&id).unwrap().unwrap().completed);
    }
}
