//! Persisted scheduler flags and ids.

use serde::{Deserialize, Serialize};

use crate::beep::BeepId;
use crate::error::StorageError;
use crate::storage::PreferenceStore;
use crate::uptime::UptimeId;

const KEY_ACTIVE: &str = "beeper_active";
const KEY_BEEP_ID: &str = "scheduled_beep_id";
const KEY_UPTIME_ID: &str = "uptime_id";
const KEY_IN_CALL: &str = "in_call";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveState {
    #[default]
    Inactive,
    Active,
    /// Paused by a phone call; resumes on its own when the call ends.
    InactiveAfterCall,
}

impl ActiveState {
    pub fn as_str(self) -> &'static str {
        match self {
            ActiveState::Inactive => "inactive",
            ActiveState::Active => "active",
            ActiveState::InactiveAfterCall => "inactive_after_call",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(ActiveState::Inactive),
            "active" => Some(ActiveState::Active),
            "inactive_after_call" => Some(ActiveState::InactiveAfterCall),
            _ => None,
        }
    }
}

/// Single source of truth for "is the scheduler running" and "which beep is
/// outstanding". Only `BeepScheduler` mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerState {
    pub active: ActiveState,
    pub current_beep_id: Option<BeepId>,
    pub current_uptime_id: Option<UptimeId>,
    pub in_call: bool,
}

fn parse_id(key: &str, raw: Option<String>) -> Result<Option<i64>, StorageError> {
    raw.map(|v| {
        v.parse::<i64>()
            .map_err(|_| StorageError::Corrupt(format!("{key} = '{v}'")))
    })
    .transpose()
}

impl SchedulerState {
    /// Read the persisted state. Missing keys mean a fresh install.
    pub fn load<P: PreferenceStore + ?Sized>(prefs: &P) -> Result<Self, StorageError> {
        let active = match prefs.pref_get(KEY_ACTIVE)? {
            Some(raw) => ActiveState::parse(&raw)
                .ok_or_else(|| StorageError::Corrupt(format!("{KEY_ACTIVE} = '{raw}'")))?,
            None => ActiveState::Inactive,
        };
        let in_call = match prefs.pref_get(KEY_IN_CALL)?.as_deref() {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                return Err(StorageError::Corrupt(format!("{KEY_IN_CALL} = '{other}'")));
            }
        };
        Ok(Self {
            active,
            current_beep_id: parse_id(KEY_BEEP_ID, prefs.pref_get(KEY_BEEP_ID)?)?.map(BeepId),
            current_uptime_id: parse_id(KEY_UPTIME_ID, prefs.pref_get(KEY_UPTIME_ID)?)?
                .map(UptimeId),
            in_call,
        })
    }

    pub fn save<P: PreferenceStore + ?Sized>(&self, prefs: &P) -> Result<(), StorageError> {
        prefs.pref_set(KEY_ACTIVE, self.active.as_str())?;
        prefs.pref_set(KEY_IN_CALL, if self.in_call { "true" } else { "false" })?;
        match self.current_beep_id {
            Some(id) => prefs.pref_set(KEY_BEEP_ID, &id.to_string())?,
            None => prefs.pref_remove(KEY_BEEP_ID)?,
        }
        match self.current_uptime_id {
            Some(id) => prefs.pref_set(KEY_UPTIME_ID, &id.to_string())?,
            None => prefs.pref_remove(KEY_UPTIME_ID)?,
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active == ActiveState::Active
    }
}
