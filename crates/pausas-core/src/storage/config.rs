//! TOML-based user settings.
//!
//! Stores the preferences the timer reads at each phase transition:
//! - Work interval and break length
//! - Alarm volume and sound
//! - Notification and auto-start switches
//! - Working hours (used for the expected breaks per day)
//!
//! Settings are stored at `~/.config/pausas-activas/settings.toml`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError};
use crate::timer::engine::clamp_seconds;

/// Allowed work intervals in minutes. Anything else snaps to the nearest.
pub const WORK_INTERVAL_OPTIONS: [f64; 5] = [60.0, 120.0, 180.0, 240.0, 300.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlarmType {
    #[default]
    Gentle,
    Chime,
    Bell,
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_work_interval")]
    pub work_interval_minutes: f64,
    #[serde(default = "default_break_duration")]
    pub break_duration_minutes: f64,
    /// 0.0 ..= 1.0
    #[serde(default = "default_volume")]
    pub alarm_volume: f32,
    #[serde(default)]
    pub alarm_type: AlarmType,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_start_next_cycle: bool,
    #[serde(default = "default_work_start_hour")]
    pub work_start_hour: u32,
    #[serde(default = "default_work_end_hour")]
    pub work_end_hour: u32,
}

fn default_work_interval() -> f64 {
    120.0
}
fn default_break_duration() -> f64 {
    10.0
}
fn default_volume() -> f32 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_work_start_hour() -> u32 {
    8
}
fn default_work_end_hour() -> u32 {
    18
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_interval_minutes: default_work_interval(),
            break_duration_minutes: default_break_duration(),
            alarm_volume: default_volume(),
            alarm_type: AlarmType::default(),
            notifications_enabled: false,
            auto_start_next_cycle: true,
            work_start_hour: default_work_start_hour(),
            work_end_hour: default_work_end_hour(),
        }
    }
}

/// Snap a work interval to the nearest allowed option; ties go to the
/// shorter interval.
pub fn normalize_work_interval(minutes: f64) -> f64 {
    if !minutes.is_finite() {
        return default_work_interval();
    }
    let mut closest = WORK_INTERVAL_OPTIONS[0];
    let mut min_distance = (minutes - closest).abs();
    for option in WORK_INTERVAL_OPTIONS.iter().skip(1).copied() {
        let distance = (minutes - option).abs();
        if distance < min_distance || (distance == min_distance && option < closest) {
            closest = option;
            min_distance = distance;
        }
    }
    closest
}

impl Settings {
    /// Work interval length in whole seconds.
    pub fn work_seconds(&self) -> u64 {
        clamp_seconds(self.work_interval_minutes * 60.0)
    }

    /// Break length in whole seconds.
    pub fn break_seconds(&self) -> u64 {
        clamp_seconds(self.break_duration_minutes * 60.0)
    }

    pub fn volume(&self) -> f32 {
        if self.alarm_volume.is_finite() {
            self.alarm_volume.clamp(0.0, 1.0)
        } else {
            default_volume()
        }
    }

    /// Breaks that fit in the working day at the current interval.
    pub fn expected_breaks_per_day(&self) -> u32 {
        let hours = self.work_end_hour.saturating_sub(self.work_start_hour) as f64;
        let interval_hours = self.work_interval_minutes / 60.0;
        if !interval_hours.is_finite() || interval_hours <= 0.0 {
            return 0;
        }
        (hours / interval_hours).floor() as u32
    }

    /// Apply the same clamping the loader applies.
    pub fn normalized(mut self) -> Self {
        self.work_interval_minutes = normalize_work_interval(self.work_interval_minutes);
        if !self.break_duration_minutes.is_finite() || self.break_duration_minutes < 0.0 {
            self.break_duration_minutes = 0.0;
        }
        self.alarm_volume = self.volume();
        self
    }

    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("settings.toml"))
    }

    /// Load from the default location, writing defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default settings cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let settings: Settings =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                Ok(settings.normalized())
            }
            Err(_) => {
                let settings = Self::default();
                settings.save_to(path)?;
                Ok(settings)
            }
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by key in memory. The result is normalized; callers
    /// decide when to save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Settings = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        *self = updated.normalized();
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

/// Source of the current settings. Read at each phase transition, never
/// cached by the scheduler.
pub trait SettingsProvider {
    fn settings(&self) -> Settings;
}

impl SettingsProvider for Settings {
    fn settings(&self) -> Settings {
        self.clone()
    }
}

/// Settings that can be changed while a scheduler holds a handle.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl SettingsProvider for SharedSettings {
    fn settings(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
