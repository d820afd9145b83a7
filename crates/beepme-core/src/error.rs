//! Core error types for beepme-core.
//!
//! Storage failures, configuration problems and scheduler invariant
//! violations each get their own variant so callers can tell a flaky disk
//! from a logic bug.

use std::path::PathBuf;
use thiserror::Error;

use crate::beep::BeepStatus;

/// Core error type for beepme-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence collaborator failed; the in-flight operation was aborted.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Beep status change that the lifecycle does not allow.
    #[error("Invalid transition for beep {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: BeepStatus,
        to: BeepStatus,
    },

    /// An uptime interval is already open.
    #[error("Uptime interval {id} is already open")]
    AlreadyOpen { id: i64 },

    /// The uptime interval was closed earlier.
    #[error("Uptime interval {id} is already closed")]
    AlreadyClosed { id: i64 },

    /// Scheduling was requested while another beep is still active.
    #[error("Beep {id} is still active")]
    BeepInFlight { id: i64 },

    /// The beep was already presented, or is no longer active.
    #[error("Beep {id} cannot fire again")]
    AlreadyFired { id: i64 },

    /// A computed timestamp does not fit the supported calendar range.
    #[error("{what} is out of the supported time range")]
    TimeOutOfRange { what: &'static str },

    /// A thread panicked while holding the scheduler lock.
    #[error("Scheduler lock poisoned")]
    LockPoisoned,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Invariant violations. These are never retried.
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidTransition { .. }
                | CoreError::AlreadyOpen { .. }
                | CoreError::AlreadyClosed { .. }
                | CoreError::BeepInFlight { .. }
                | CoreError::AlreadyFired { .. }
        )
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, CoreError::Storage(_))
    }
}

/// Persistence-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A persisted value could not be decoded.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// Backend cannot be reached at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logic_errors_are_classified() {
        let err = CoreError::InvalidTransition {
            id: 3,
            from: BeepStatus::Received,
            to: BeepStatus::Expired,
        };
        assert!(err.is_logic_error());
        assert!(!err.is_storage_error());
        assert_eq!(
            err.to_string(),
            "Invalid transition for beep 3: received -> expired"
        );

        let err = CoreError::from(StorageError::Unavailable("disk gone".into()));
        assert!(err.is_storage_error());
        assert!(!err.is_logic_error());
    }

    #[test]
    fn not_found_is_not_a_logic_error() {
        let err = CoreError::NotFound {
            entity: "uptime",
            id: 9,
        };
        assert!(!err.is_logic_error());
        assert_eq!(err.to_string(), "uptime 9 not found");
    }

    #[test]
    fn time_overflow_is_reported_not_retried() {
        let err = CoreError::TimeOutOfRange { what: "beep fire time" };
        assert!(!err.is_logic_error());
        assert!(!err.is_storage_error());
        assert_eq!(err.to_string(), "beep fire time is out of the supported time range");
    }
}
