mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, TimerConfig};
pub use database::{Database, DayStats, Stats};

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::beep::{BeepId, BeepRecord, BeepStatus, NewBeep};
use crate::error::{Result, StorageError};
use crate::uptime::{UptimeId, UptimeInterval};

/// Returns the data directory, creating it if needed.
///
/// `BEEPME_DATA_DIR` wins when set. Otherwise `~/.config/beepme[-dev]/`,
/// with `BEEPME_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("BEEPME_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("BEEPME_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("beepme-dev")
            } else {
                base_dir.join("beepme")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Row-level access to beep records.
pub trait BeepPersistence {
    fn insert_beep(&self, beep: &NewBeep) -> Result<BeepId, StorageError>;
    fn load_beep(&self, id: BeepId) -> Result<Option<BeepRecord>, StorageError>;
    fn update_beep_status(
        &self,
        id: BeepId,
        status: BeepStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    fn mark_beep_fired(&self, id: BeepId, fired_at: DateTime<Utc>) -> Result<(), StorageError>;
    fn beep_ids_with_status(&self, status: BeepStatus) -> Result<Vec<BeepId>, StorageError>;
    fn beeps_for_uptime(&self, uptime_id: UptimeId) -> Result<Vec<BeepRecord>, StorageError>;
}

/// Row-level access to uptime intervals.
pub trait UptimePersistence {
    fn insert_uptime(&self, start: DateTime<Utc>) -> Result<UptimeId, StorageError>;
    fn load_uptime(&self, id: UptimeId) -> Result<Option<UptimeInterval>, StorageError>;
    fn close_uptime(&self, id: UptimeId, end: DateTime<Utc>) -> Result<(), StorageError>;
    fn open_uptime_ids(&self) -> Result<Vec<UptimeId>, StorageError>;
}

/// Synchronous, durable key/value preferences.
pub trait PreferenceStore {
    fn pref_get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn pref_set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn pref_remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Everything the scheduler persists, plus atomic grouping of writes.
pub trait Storage: BeepPersistence + UptimePersistence + PreferenceStore + Send {
    /// Run `f` so that either all of its writes land or none do.
    ///
    /// Collaborators must not call back into the scheduler from here.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}
