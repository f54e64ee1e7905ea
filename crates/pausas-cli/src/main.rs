use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(name = "pausas", version, about = "Pausas Activas CLI")]
struct Cli {
    /// Namespace timer state and exercise history under this user
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One-shot timer control on the saved state
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Run the timer in the foreground, reading commands from stdin
    Run,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Break history and compliance
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Exercise catalog
    Exercises {
        #[command(subcommand)]
        action: commands::exercises::ExercisesAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let user = cli.user.as_deref();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action, user),
        Commands::Run => commands::run::run(user),
        Commands::Config { action } => commands::config::run(action),
        Commands::History { action } => commands::history::run(action, user),
        Commands::Exercises { action } => commands::exercises::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
