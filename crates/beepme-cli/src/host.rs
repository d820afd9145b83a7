//! Host-side collaborators for a process that does not stay resident.
//!
//! Wake-ups live in a JSON file next to the database; `scheduler tick`
//! polls it. Notifications are log lines on stderr.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use beepme_core::{Notifier, WakeupTimer};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

const ALARM_FILE: &str = "alarms.json";
const TEST_MODE_ALARM_FILE: &str = "alarms_test.json";

/// Wake-up registrations keyed by logical alarm key.
pub type Alarms = BTreeMap<String, DateTime<Utc>>;

pub struct AlarmFile {
    path: PathBuf,
}

impl AlarmFile {
    /// Test mode keeps its own file, alongside its own database.
    pub fn in_dir(dir: &Path, test_mode: bool) -> Self {
        let name = if test_mode {
            TEST_MODE_ALARM_FILE
        } else {
            ALARM_FILE
        };
        Self {
            path: dir.join(name),
        }
    }

    /// Current registrations. A missing or unreadable file counts as none.
    pub fn load(&self) -> Alarms {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Alarms::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read alarm file");
                return Alarms::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "discarding malformed alarm file");
            Alarms::new()
        })
    }

    fn store(&self, alarms: &Alarms) {
        let result = serde_json::to_string_pretty(alarms)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&self.path, json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "cannot write alarm file");
        }
    }

    pub fn pending(&self, key: &str) -> Option<DateTime<Utc>> {
        self.load().get(key).copied()
    }

    /// Remove and return the registration for `key` if it is due at `now`.
    pub fn take_due(&self, key: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut alarms = self.load();
        match alarms.get(key) {
            Some(&at) if at <= now => {
                alarms.remove(key);
                self.store(&alarms);
                Some(at)
            }
            _ => None,
        }
    }
}

impl WakeupTimer for AlarmFile {
    fn register_at(&self, key: &str, at: DateTime<Utc>) {
        let mut alarms = self.load();
        alarms.insert(key.to_string(), at);
        self.store(&alarms);
    }

    fn cancel(&self, key: &str) {
        let mut alarms = self.load();
        if alarms.remove(key).is_some() {
            self.store(&alarms);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_persistent_ongoing(&self, test_mode: bool) {
        if test_mode {
            info!("beeper running (test mode)");
        } else {
            info!("beeper running");
        }
    }

    fn clear(&self) {
        info!("beeper notifications cleared");
    }

    fn present_beep(&self) {
        info!("BEEP: what are you experiencing right now?");
    }
}
