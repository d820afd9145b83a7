//! Beep records and their lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Active -> Received | Expired | Cancelled
//! ```
//!
//! `Active` is only ever entered on creation. The three other states are
//! terminal.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::storage::BeepPersistence;
use crate::uptime::UptimeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeepId(pub i64);

impl fmt::Display for BeepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeepStatus {
    Active,
    Received,
    Expired,
    Cancelled,
}

impl BeepStatus {
    pub const ALL: [BeepStatus; 4] = [
        BeepStatus::Active,
        BeepStatus::Received,
        BeepStatus::Expired,
        BeepStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        !matches!(self, BeepStatus::Active)
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: BeepStatus) -> bool {
        self == BeepStatus::Active && next.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BeepStatus::Active => "active",
            BeepStatus::Received => "received",
            BeepStatus::Expired => "expired",
            BeepStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BeepStatus::Active),
            "received" => Some(BeepStatus::Received),
            "expired" => Some(BeepStatus::Expired),
            "cancelled" => Some(BeepStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BeepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeepRecord {
    pub id: BeepId,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// When the wake-up for this beep was registered to go off.
    pub scheduled_for: DateTime<Utc>,
    /// Set once the user has been prompted; a fired beep is never presented again.
    pub fired_at: Option<DateTime<Utc>>,
    pub status: BeepStatus,
    pub uptime_id: Option<UptimeId>,
}

impl BeepRecord {
    /// Active and `now` is past the fire time plus the response window.
    pub fn is_overdue(&self, now: DateTime<Utc>, response_window: Duration) -> bool {
        self.status == BeepStatus::Active
            && self
                .scheduled_for
                .checked_add_signed(response_window)
                .is_some_and(|deadline| now > deadline)
    }

    pub fn has_fired(&self) -> bool {
        self.fired_at.is_some()
    }

    /// Latest moment this record was touched.
    pub fn last_activity(&self) -> DateTime<Utc> {
        [self.updated_at, self.fired_at]
            .into_iter()
            .flatten()
            .fold(self.created_at, DateTime::max)
    }
}

/// Values for a record that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewBeep {
    pub created_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    pub uptime_id: Option<UptimeId>,
}

/// Typed view over the beep table.
///
/// Records are only ever appended or moved forward through the lifecycle;
/// nothing here deletes.
pub struct BeepStore<'a, P: BeepPersistence + ?Sized> {
    db: &'a P,
}

impl<'a, P: BeepPersistence + ?Sized> BeepStore<'a, P> {
    pub fn new(db: &'a P) -> Self {
        Self { db }
    }

    /// Insert a new `Active` beep created at `now`.
    pub fn create(
        &self,
        uptime_id: Option<UptimeId>,
        now: DateTime<Utc>,
        scheduled_for: DateTime<Utc>,
    ) -> Result<BeepRecord> {
        let new = NewBeep {
            created_at: now,
            scheduled_for,
            uptime_id,
        };
        let id = self.db.insert_beep(&new)?;
        Ok(BeepRecord {
            id,
            created_at: new.created_at,
            updated_at: None,
            scheduled_for: new.scheduled_for,
            fired_at: None,
            status: BeepStatus::Active,
            uptime_id: new.uptime_id,
        })
    }

    pub fn get(&self, id: BeepId) -> Result<Option<BeepRecord>> {
        Ok(self.db.load_beep(id)?)
    }

    fn require(&self, id: BeepId) -> Result<BeepRecord> {
        self.get(id)?.ok_or(CoreError::NotFound {
            entity: "beep",
            id: id.0,
        })
    }

    /// Move a record through the lifecycle, stamping `updated_at`.
    pub fn update_status(&self, id: BeepId, status: BeepStatus, now: DateTime<Utc>) -> Result<BeepRecord> {
        let mut record = self.require(id)?;
        if !record.status.can_transition_to(status) {
            return Err(CoreError::InvalidTransition {
                id: id.0,
                from: record.status,
                to: status,
            });
        }
        self.db.update_beep_status(id, status, now)?;
        record.status = status;
        record.updated_at = Some(now);
        Ok(record)
    }

    /// Record that the beep was presented. Only an unfired `Active` beep can fire.
    pub fn mark_fired(&self, id: BeepId, now: DateTime<Utc>) -> Result<BeepRecord> {
        let mut record = self.require(id)?;
        if record.status != BeepStatus::Active || record.has_fired() {
            return Err(CoreError::AlreadyFired { id: id.0 });
        }
        self.db.mark_beep_fired(id, now)?;
        record.fired_at = Some(now);
        Ok(record)
    }

    pub fn is_overdue(&self, id: BeepId, now: DateTime<Utc>, response_window: Duration) -> Result<bool> {
        Ok(self.require(id)?.is_overdue(now, response_window))
    }

    pub fn active_ids(&self) -> Result<Vec<BeepId>> {
        Ok(self.db.beep_ids_with_status(BeepStatus::Active)?)
    }

    pub fn latest_activity_for_uptime(&self, uptime_id: UptimeId) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .db
            .beeps_for_uptime(uptime_id)?
            .iter()
            .map(BeepRecord::last_activity)
            .max())
    }
}
