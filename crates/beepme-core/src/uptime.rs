//! Uptime intervals: continuous spans during which the scheduler was active.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::storage::UptimePersistence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UptimeId(pub i64);

impl fmt::Display for UptimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeInterval {
    pub id: UptimeId,
    pub start: DateTime<Utc>,
    /// `None` while the interval is still open.
    pub end: Option<DateTime<Utc>>,
}

impl UptimeInterval {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Length of the interval, counting an open one up to `now`.
    pub fn duration_until(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end.unwrap_or(now);
        (end - self.start).max(Duration::zero())
    }
}

/// Enforces the single-open-interval rule over a persistence backend.
pub struct UptimeTracker<'a, P: UptimePersistence + ?Sized> {
    db: &'a P,
}

impl<'a, P: UptimePersistence + ?Sized> UptimeTracker<'a, P> {
    pub fn new(db: &'a P) -> Self {
        Self { db }
    }

    /// Open a new interval at `now`. Fails if one is already open.
    pub fn start_interval(&self, now: DateTime<Utc>) -> Result<UptimeInterval> {
        if let Some(open) = self.db.open_uptime_ids()?.first() {
            return Err(CoreError::AlreadyOpen { id: open.0 });
        }
        let id = self.db.insert_uptime(now)?;
        Ok(UptimeInterval {
            id,
            start: now,
            end: None,
        })
    }

    /// Close an open interval. The end is never earlier than the start.
    pub fn end_interval(&self, id: UptimeId, now: DateTime<Utc>) -> Result<UptimeInterval> {
        let mut interval = self.get(id)?.ok_or(CoreError::NotFound {
            entity: "uptime",
            id: id.0,
        })?;
        if !interval.is_open() {
            return Err(CoreError::AlreadyClosed { id: id.0 });
        }
        let end = now.max(interval.start);
        self.db.close_uptime(id, end)?;
        interval.end = Some(end);
        Ok(interval)
    }

    pub fn get(&self, id: UptimeId) -> Result<Option<UptimeInterval>> {
        Ok(self.db.load_uptime(id)?)
    }

    pub fn open_intervals(&self) -> Result<Vec<UptimeInterval>> {
        let mut open = Vec::new();
        for id in self.db.open_uptime_ids()? {
            if let Some(interval) = self.db.load_uptime(id)? {
                open.push(interval);
            }
        }
        Ok(open)
    }
}
