//! SQLite-based storage for beeps, uptime intervals and preferences.
//!
//! Provides persistent storage for:
//! - Scheduled beeps and their lifecycle status
//! - Uptime intervals
//! - Key-value store for scheduler state
//! - Per-day history statistics

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations, BeepPersistence, PreferenceStore, Storage, UptimePersistence};
use crate::beep::{BeepId, BeepRecord, BeepStatus, NewBeep};
use crate::error::{Result, StorageError};
use crate::uptime::{UptimeId, UptimeInterval};

const DB_NAME: &str = "beepme.db";
const TEST_MODE_DB_NAME: &str = "beepme_test.db";

/// History for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    pub day: NaiveDate,
    /// Seconds of uptime that started on this day.
    pub uptime_secs: i64,
    pub received: u64,
    pub expired: u64,
    pub cancelled: u64,
    pub active: u64,
}

impl DayStats {
    fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            uptime_secs: 0,
            received: 0,
            expired: 0,
            cancelled: 0,
            active: 0,
        }
    }

    pub fn total_beeps(&self) -> u64 {
        self.received + self.expired + self.cancelled + self.active
    }

    fn count(&mut self, status: BeepStatus) {
        match status {
            BeepStatus::Active => self.active += 1,
            BeepStatus::Received => self.received += 1,
            BeepStatus::Expired => self.expired += 1,
            BeepStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_uptime_secs: i64,
    pub total_beeps: u64,
    pub received: u64,
    pub expired: u64,
    pub cancelled: u64,
    pub days_active: u64,
}

/// SQLite database backing the scheduler's persistence and preferences.
pub struct Database {
    conn: Connection,
}

fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn decode_status(raw: &str) -> Result<BeepStatus, StorageError> {
    BeepStatus::parse(raw).ok_or_else(|| StorageError::Corrupt(format!("beep status '{raw}'")))
}

type BeepRow = (i64, String, Option<String>, String, Option<String>, String, Option<i64>);

fn decode_beep(row: BeepRow) -> Result<BeepRecord, StorageError> {
    let (id, created_at, updated_at, scheduled_for, fired_at, status, uptime_id) = row;
    Ok(BeepRecord {
        id: BeepId(id),
        created_at: decode_time(&created_at)?,
        updated_at: updated_at.as_deref().map(decode_time).transpose()?,
        scheduled_for: decode_time(&scheduled_for)?,
        fired_at: fired_at.as_deref().map(decode_time).transpose()?,
        status: decode_status(&status)?,
        uptime_id: uptime_id.map(UptimeId),
    })
}

fn read_beep_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BeepRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_uptime(row: (i64, String, Option<String>)) -> Result<UptimeInterval, StorageError> {
    let (id, start, end) = row;
    Ok(UptimeInterval {
        id: UptimeId(id),
        start: decode_time(&start)?,
        end: end.as_deref().map(decode_time).transpose()?,
    })
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database in the data directory.
    ///
    /// Test mode keeps its beeps in a separate file so they never mix with
    /// real samples.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(test_mode: bool) -> Result<Self, StorageError> {
        let dir = data_dir().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let name = if test_mode { TEST_MODE_DB_NAME } else { DB_NAME };
        Self::open_at(&dir.join(name))
    }

    /// Open (or create) the database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        migrations::migrate(&self.conn).map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    pub fn uptimes(&self) -> Result<Vec<UptimeInterval>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, start_at, end_at FROM uptimes ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(decode_uptime).collect()
    }

    pub fn beeps(&self) -> Result<Vec<BeepRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, updated_at, scheduled_for, fired_at, status, uptime_id
             FROM beeps ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], read_beep_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(decode_beep).collect()
    }

    /// Per-day history, oldest first. Open intervals count up to `now`.
    pub fn daily_stats(&self, now: DateTime<Utc>) -> Result<Vec<DayStats>, StorageError> {
        let mut days: BTreeMap<NaiveDate, DayStats> = BTreeMap::new();

        for interval in self.uptimes()? {
            let day = interval.start.date_naive();
            days.entry(day)
                .or_insert_with(|| DayStats::empty(day))
                .uptime_secs += interval.duration_until(now).num_seconds();
        }

        for beep in self.beeps()? {
            let day = beep.created_at.date_naive();
            days.entry(day)
                .or_insert_with(|| DayStats::empty(day))
                .count(beep.status);
        }

        Ok(days.into_values().collect())
    }

    pub fn stats_today(&self, now: DateTime<Utc>) -> Result<DayStats, StorageError> {
        let today = now.date_naive();
        Ok(self
            .daily_stats(now)?
            .into_iter()
            .find(|d| d.day == today)
            .unwrap_or_else(|| DayStats::empty(today)))
    }

    pub fn stats_all(&self, now: DateTime<Utc>) -> Result<Stats, StorageError> {
        let mut stats = Stats::default();
        for day in self.daily_stats(now)? {
            stats.total_uptime_secs += day.uptime_secs;
            stats.total_beeps += day.total_beeps();
            stats.received += day.received;
            stats.expired += day.expired;
            stats.cancelled += day.cancelled;
            if day.uptime_secs > 0 {
                stats.days_active += 1;
            }
        }
        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl BeepPersistence for Database {
    fn insert_beep(&self, beep: &NewBeep) -> Result<BeepId, StorageError> {
        self.conn.execute(
            "INSERT INTO beeps (created_at, updated_at, scheduled_for, status, uptime_id)
             VALUES (?1, NULL, ?2, ?3, ?4)",
            params![
                encode_time(beep.created_at),
                encode_time(beep.scheduled_for),
                BeepStatus::Active.as_str(),
                beep.uptime_id.map(|id| id.0),
            ],
        )?;
        Ok(BeepId(self.conn.last_insert_rowid()))
    }

    fn load_beep(&self, id: BeepId) -> Result<Option<BeepRecord>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, created_at, updated_at, scheduled_for, fired_at, status, uptime_id
                 FROM beeps WHERE id = ?1",
                params![id.0],
                read_beep_row,
            )
            .optional()?;
        row.map(decode_beep).transpose()
    }

    fn update_beep_status(
        &self,
        id: BeepId,
        status: BeepStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE beeps SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), encode_time(updated_at), id.0],
        )?;
        if changed == 0 {
            return Err(StorageError::QueryFailed(format!("beep {id} vanished during update")));
        }
        Ok(())
    }

    fn mark_beep_fired(&self, id: BeepId, fired_at: DateTime<Utc>) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE beeps SET fired_at = ?1 WHERE id = ?2",
            params![encode_time(fired_at), id.0],
        )?;
        if changed == 0 {
            return Err(StorageError::QueryFailed(format!("beep {id} vanished during update")));
        }
        Ok(())
    }

    fn beep_ids_with_status(&self, status: BeepStatus) -> Result<Vec<BeepId>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM beeps WHERE status = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![status.as_str()], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(BeepId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn beeps_for_uptime(&self, uptime_id: UptimeId) -> Result<Vec<BeepRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, updated_at, scheduled_for, fired_at, status, uptime_id
             FROM beeps WHERE uptime_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![uptime_id.0], read_beep_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(decode_beep).collect()
    }
}

impl UptimePersistence for Database {
    fn insert_uptime(&self, start: DateTime<Utc>) -> Result<UptimeId, StorageError> {
        self.conn.execute(
            "INSERT INTO uptimes (start_at, end_at) VALUES (?1, NULL)",
            params![encode_time(start)],
        )?;
        Ok(UptimeId(self.conn.last_insert_rowid()))
    }

    fn load_uptime(&self, id: UptimeId) -> Result<Option<UptimeInterval>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, start_at, end_at FROM uptimes WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map(decode_uptime).transpose()
    }

    fn close_uptime(&self, id: UptimeId, end: DateTime<Utc>) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE uptimes SET end_at = ?1 WHERE id = ?2 AND end_at IS NULL",
            params![encode_time(end), id.0],
        )?;
        if changed == 0 {
            return Err(StorageError::QueryFailed(format!("uptime {id} is not open")));
        }
        Ok(())
    }

    fn open_uptime_ids(&self) -> Result<Vec<UptimeId>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM uptimes WHERE end_at IS NULL ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(UptimeId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

impl PreferenceStore for Database {
    fn pref_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.kv_get(key)?)
    }

    fn pref_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(self.kv_set(key, value)?)
    }

    fn pref_remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl Storage for Database {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction().map_err(StorageError::from)?;
        // Dropping `tx` on the error path rolls everything back.
        let out = f(self)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(out)
    }
}
