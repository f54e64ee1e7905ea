mod config;
pub mod database;
pub mod kv;

pub use config::{AlarmType, Settings, SettingsProvider, SharedSettings};
pub use database::Database;
pub use kv::{KvStore, MemoryKvStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/pausas-activas[-dev]/` based on PAUSAS_ENV.
///
/// Set PAUSAS_ENV=dev to use development data directory. PAUSAS_DATA_DIR, when
/// set, replaces the whole path.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os("PAUSAS_DATA_DIR").filter(|d| !d.is_empty()) {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PAUSAS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pausas-activas-dev")
    } else {
        base_dir.join("pausas-activas")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
