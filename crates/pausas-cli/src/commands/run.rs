//! Foreground timer: the async driver plus a stdin command reader.

use pausas_core::timer::{Command, Driver};
use pausas_core::{Settings, SharedSettings, TimerEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::runtime;

const HELP: &str = "commands: start, pause, resume, reset, visible, status, reload, quit";

pub fn run(user: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let (mut scheduler, runner, settings) = runtime::open(user)?;
    scheduler.subscribe(print_event);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let (tx, rx) = mpsc::channel(16);
        let reader = tokio::spawn(read_commands(tx, settings));
        eprintln!("{HELP}");

        let scheduler = Driver::new(scheduler, runner).run(rx).await;
        reader.abort();
        println!("{}", serde_json::to_string(&scheduler.snapshot())?);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn print_event(event: &TimerEvent) {
    // Ticks would flood the terminal.
    if matches!(event, TimerEvent::Tick { .. }) {
        return;
    }
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "could not render event"),
    }
}

async fn read_commands(tx: mpsc::Sender<Command>, settings: SharedSettings) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        let command = match line.trim() {
            "" => continue,
            "start" => Command::Start,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "reset" => Command::Reset,
            "visible" => Command::Visible,
            "quit" | "exit" => Command::Quit,
            "reload" => {
                let fresh = Settings::load_or_default();
                settings.update(|current| *current = fresh);
                eprintln!("settings reloaded");
                continue;
            }
            "status" => {
                let (reply, snapshot) = oneshot::channel();
                if tx.send(Command::Status(reply)).await.is_err() {
                    break;
                }
                match snapshot.await {
                    Ok(snapshot) => match serde_json::to_string(&snapshot) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!(error = %e, "could not render snapshot"),
                    },
                    Err(_) => break,
                }
                continue;
            }
            other => {
                eprintln!("unknown command: {other} ({HELP})");
                continue;
            }
        };
        if tx.send(command).await.is_err() {
            break;
        }
    }
    // Dropping the sender stops the driver once stdin ends.
}
