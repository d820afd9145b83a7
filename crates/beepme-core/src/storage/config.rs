//! TOML-based application configuration.
//!
//! Stores:
//! - The timer profile used to space beeps
//! - The response window after which an unanswered beep is overdue
//! - An optional fixed random seed
//! - Test mode
//!
//! Configuration is stored at `<data dir>/config.toml`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{TimerProfile, MAX_WAIT_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Uniform,
    Exponential,
    Fixed,
}

/// Timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_profile")]
    pub profile: ProfileKind,
    #[serde(default = "default_min_secs")]
    pub min_secs: u64,
    #[serde(default = "default_max_secs")]
    pub max_secs: u64,
    /// Mean wait for the exponential profile, or the wait for the fixed one.
    #[serde(default = "default_mean_secs")]
    pub mean_secs: u64,
    #[serde(default = "default_response_window_secs")]
    pub response_window_secs: u64,
    /// Fixed seed for a reproducible random source.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    /// Keep beeps in a separate database and flag the ongoing notification.
    #[serde(default)]
    pub test_mode: bool,
}

fn default_profile() -> ProfileKind {
    ProfileKind::Exponential
}
fn default_min_secs() -> u64 {
    120
}
fn default_max_secs() -> u64 {
    5400
}
fn default_mean_secs() -> u64 {
    1800
}
fn default_response_window_secs() -> u64 {
    60
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            min_secs: default_min_secs(),
            max_secs: default_max_secs(),
            mean_secs: default_mean_secs(),
            response_window_secs: default_response_window_secs(),
            seed: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            test_mode: false,
        }
    }
}

impl Config {
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
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    // Optional numbers (seed) are null until set; "none" clears them.
                    serde_json::Value::Number(_) | serde_json::Value::Null if value == "none" => {
                        serde_json::Value::Null
                    }
                    serde_json::Value::Number(_) | serde_json::Value::Null => {
                        serde_json::Value::Number(
                            value
                                .parse::<u64>()
                                .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                                .into(),
                        )
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or return (and write) the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Parse and validate TOML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the resulting config is invalid.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timer;
        for (key, secs) in [
            ("timer.min_secs", t.min_secs),
            ("timer.max_secs", t.max_secs),
            ("timer.mean_secs", t.mean_secs),
            ("timer.response_window_secs", t.response_window_secs),
        ] {
            if secs > MAX_WAIT_SECS {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("{secs}s exceeds the limit of {MAX_WAIT_SECS}s"),
                });
            }
        }
        if t.min_secs > t.max_secs {
            return Err(ConfigError::InvalidValue {
                key: "timer.min_secs".into(),
                message: format!("min_secs ({}) exceeds max_secs ({})", t.min_secs, t.max_secs),
            });
        }
        if t.mean_secs == 0 && t.profile != ProfileKind::Uniform {
            return Err(ConfigError::InvalidValue {
                key: "timer.mean_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn timer_profile(&self) -> TimerProfile {
        let t = &self.timer;
        match t.profile {
            ProfileKind::Uniform => TimerProfile::Uniform {
                min_secs: t.min_secs,
                max_secs: t.max_secs,
            },
            ProfileKind::Exponential => TimerProfile::Exponential {
                mean_secs: t.mean_secs,
                min_secs: t.min_secs,
                max_secs: t.max_secs,
            },
            ProfileKind::Fixed => TimerProfile::Fixed { secs: t.mean_secs },
        }
    }

    pub fn response_window(&self) -> Duration {
        Duration::seconds(self.timer.response_window_secs.min(MAX_WAIT_SECS) as i64)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
