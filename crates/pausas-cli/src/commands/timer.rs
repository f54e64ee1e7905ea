use clap::Subcommand;

use crate::runtime;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a work interval
    Start,
    /// Pause the running work interval
    Pause,
    /// Resume a paused work interval
    Resume,
    /// Reset to idle and forget the saved state
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Re-derive remaining time from the saved start time
    Visible,
}

/// Each invocation restores the saved cycle (catching up on the time that
/// passed since the last one), applies the action and prints a snapshot.
pub fn run(action: TimerAction, user: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let (mut scheduler, runner, _) = runtime::open(user)?;

    let mut effects = scheduler.restore_state();
    effects.extend(match action {
        TimerAction::Start => scheduler.start_work(),
        TimerAction::Pause => scheduler.pause_work(),
        TimerAction::Resume => scheduler.resume_work(),
        TimerAction::Reset => scheduler.reset_all(),
        TimerAction::Status => Vec::new(),
        TimerAction::Visible => scheduler.recalculate_after_tab_visible(),
    });
    runtime::settle(&mut scheduler, &runner, effects);

    println!("{}", serde_json::to_string_pretty(&scheduler.snapshot())?);
    if let Some(error) = scheduler.last_error() {
        eprintln!("warning: {error}");
    }
    Ok(())
}
