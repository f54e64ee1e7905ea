use clap::Subcommand;
use pausas_core::Settings;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "work_interval_minutes", "alarm_volume")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let settings = Settings::load()?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load()?;
            settings.set(&key, &value)?;
            settings.save()?;
            // Normalization may have adjusted the value.
            println!("{}", settings.get(&key).unwrap_or(value));
        }
        ConfigAction::List => {
            let settings = Settings::load()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigAction::Reset => {
            Settings::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
