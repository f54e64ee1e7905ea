use chrono::{Duration, NaiveDate, Utc};
use clap::Subcommand;
use pausas_core::HistoryDb;
use serde_json::json;

/// Days covered by `history week`, today included.
const WEEK_DAYS: i64 = 7;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Today's break sessions and compliance
    Today,
    /// Daily records for the last seven days
    Week,
    /// Average compliance and streaks
    Stats {
        /// Number of days to include
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Set how many breaks a day is expected to contain
    Expect {
        /// Expected sessions
        sessions: u32,
        /// Day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

pub fn run(action: HistoryAction, user: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let history = HistoryDb::open(user)?;
    let today = Utc::now().date_naive();

    let output = match action {
        HistoryAction::Today => json!({
            "record": history.daily_record(today)?,
            "sessions": history.sessions_by_date(today)?,
        }),
        HistoryAction::Week => {
            let from = today - Duration::days(WEEK_DAYS - 1);
            serde_json::to_value(history.daily_records(from, today)?)?
        }
        HistoryAction::Stats { days } => serde_json::to_value(history.compliance_stats(days, today)?)?,
        HistoryAction::Expect { sessions, date } => {
            serde_json::to_value(history.set_expected_sessions(date.unwrap_or(today), sessions)?)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
