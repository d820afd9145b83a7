//! Shared fakes for scheduler integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use beepme_core::beep::{BeepId, BeepRecord, BeepStatus, NewBeep};
use beepme_core::error::{Result, StorageError};
use beepme_core::storage::{BeepPersistence, PreferenceStore, Storage, UptimePersistence};
use beepme_core::uptime::{UptimeId, UptimeInterval};
use beepme_core::{ActiveState, BeepScheduler, Clock, Database, Notifier, SchedulerSettings, TimerProfile, WakeupTimer};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const WAIT_SECS: i64 = 120;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(offset_secs)
}

// ============================================================================
// Collaborator fakes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCall {
    Register(String, DateTime<Utc>),
    Cancel(String),
}

/// Wake-up timer with upsert-by-key semantics that remembers every call.
#[derive(Default)]
pub struct RecordingTimer {
    pending: Mutex<HashMap<String, DateTime<Utc>>>,
    calls: Mutex<Vec<TimerCall>>,
}

impl RecordingTimer {
    pub fn pending(&self, key: &str) -> Option<DateTime<Utc>> {
        self.pending.lock().unwrap().get(key).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, TimerCall::Register(..)))
            .count()
    }
}

impl WakeupTimer for RecordingTimer {
    fn register_at(&self, key: &str, at: DateTime<Utc>) {
        self.pending.lock().unwrap().insert(key.to_string(), at);
        self.calls
            .lock()
            .unwrap()
            .push(TimerCall::Register(key.to_string(), at));
    }

    fn cancel(&self, key: &str) {
        self.pending.lock().unwrap().remove(key);
        self.calls.lock().unwrap().push(TimerCall::Cancel(key.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Ongoing { test_mode: bool },
    Clear,
    Beep,
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_persistent_ongoing(&self, test_mode: bool) {
        self.notices.lock().unwrap().push(Notice::Ongoing { test_mode });
    }

    fn clear(&self) {
        self.notices.lock().unwrap().push(Notice::Clear);
    }

    fn present_beep(&self) {
        self.notices.lock().unwrap().push(Notice::Beep);
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Storage with injectable failures
// ============================================================================

/// Wraps a real database; selected writes can be made to fail.
pub struct FlakyStorage {
    pub inner: Database,
    pub fail_prefs: AtomicBool,
    pub fail_beep_updates: AtomicBool,
}

impl FlakyStorage {
    pub fn new(inner: Database) -> Self {
        Self {
            inner,
            fail_prefs: AtomicBool::new(false),
            fail_beep_updates: AtomicBool::new(false),
        }
    }

    fn check(flag: &AtomicBool) -> std::result::Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl BeepPersistence for FlakyStorage {
    fn insert_beep(&self, beep: &NewBeep) -> std::result::Result<BeepId, StorageError> {
        self.inner.insert_beep(beep)
    }

    fn load_beep(&self, id: BeepId) -> std::result::Result<Option<BeepRecord>, StorageError> {
        self.inner.load_beep(id)
    }

    fn update_beep_status(
        &self,
        id: BeepId,
        status: BeepStatus,
        updated_at: DateTime<Utc>,
    ) -> std::result::Result<(), StorageError> {
        Self::check(&self.fail_beep_updates)?;
        self.inner.update_beep_status(id, status, updated_at)
    }

    fn mark_beep_fired(&self, id: BeepId, fired_at: DateTime<Utc>) -> std::result::Result<(), StorageError> {
        Self::check(&self.fail_beep_updates)?;
        self.inner.mark_beep_fired(id, fired_at)
    }

    fn beep_ids_with_status(&self, status: BeepStatus) -> std::result::Result<Vec<BeepId>, StorageError> {
        self.inner.beep_ids_with_status(status)
    }

    fn beeps_for_uptime(&self, uptime_id: UptimeId) -> std::result::Result<Vec<BeepRecord>, StorageError> {
        self.inner.beeps_for_uptime(uptime_id)
    }
}

impl UptimePersistence for FlakyStorage {
    fn insert_uptime(&self, start: DateTime<Utc>) -> std::result::Result<UptimeId, StorageError> {
        self.inner.insert_uptime(start)
    }

    fn load_uptime(&self, id: UptimeId) -> std::result::Result<Option<UptimeInterval>, StorageError> {
        self.inner.load_uptime(id)
    }

    fn close_uptime(&self, id: UptimeId, end: DateTime<Utc>) -> std::result::Result<(), StorageError> {
        self.inner.close_uptime(id, end)
    }

    fn open_uptime_ids(&self) -> std::result::Result<Vec<UptimeId>, StorageError> {
        self.inner.open_uptime_ids()
    }
}

impl PreferenceStore for FlakyStorage {
    fn pref_get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
        self.inner.pref_get(key)
    }

    fn pref_set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
        Self::check(&self.fail_prefs)?;
        self.inner.pref_set(key, value)
    }

    fn pref_remove(&self, key: &str) -> std::result::Result<(), StorageError> {
        Self::check(&self.fail_prefs)?;
        self.inner.pref_remove(key)
    }
}

impl Storage for FlakyStorage {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.inner.transaction(|_| f(self))
    }
}

/// Access to the underlying database for assertions.
pub trait Inspect {
    fn database(&self) -> &Database;
}

impl Inspect for Database {
    fn database(&self) -> &Database {
        self
    }
}

impl Inspect for FlakyStorage {
    fn database(&self) -> &Database {
        &self.inner
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness<S> {
    pub scheduler: BeepScheduler<S>,
    pub timer: Arc<RecordingTimer>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

pub fn settings() -> SchedulerSettings {
    SchedulerSettings::new(TimerProfile::Fixed {
        secs: WAIT_SECS as u64,
    })
    .with_seed(7)
}

impl Harness<Database> {
    pub fn new() -> Self {
        Self::with_storage(Database::open_memory().unwrap())
    }
}

impl<S: Storage + Inspect> Harness<S> {
    pub fn with_storage(storage: S) -> Self {
        Self::with_settings(storage, settings())
    }

    pub fn with_settings(storage: S, settings: SchedulerSettings) -> Self {
        let timer = Arc::new(RecordingTimer::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let scheduler = BeepScheduler::new(storage, settings, timer.clone(), notifier.clone())
            .unwrap()
            .with_clock(clock.clone());
        Self {
            scheduler,
            timer,
            notifier,
            clock,
        }
    }

    pub fn beeps(&self) -> Vec<BeepRecord> {
        self.scheduler
            .with_storage(|s| s.database().beeps())
            .unwrap()
            .unwrap()
    }

    pub fn uptimes(&self) -> Vec<UptimeInterval> {
        self.scheduler
            .with_storage(|s| s.database().uptimes())
            .unwrap()
            .unwrap()
    }

    pub fn active_beeps(&self) -> Vec<BeepRecord> {
        self.beeps()
            .into_iter()
            .filter(|b| b.status == BeepStatus::Active)
            .collect()
    }

    pub fn open_uptimes(&self) -> Vec<UptimeInterval> {
        self.uptimes().into_iter().filter(|u| u.is_open()).collect()
    }
}

// ============================================================================
// Invariants
// ============================================================================

/// At most one active beep and one open interval, both tracked by the state
/// exactly when the scheduler is active.
pub fn check_invariants<S: Storage + Inspect>(h: &Harness<S>) {
    let state = h.scheduler.snapshot().unwrap();
    let active = h.active_beeps();
    let open = h.open_uptimes();

    assert!(active.len() <= 1, "several active beeps: {active:?}");
    assert!(open.len() <= 1, "several open uptimes: {open:?}");
    for interval in h.uptimes() {
        if let Some(end) = interval.end {
            assert!(end >= interval.start, "interval ends before it starts: {interval:?}");
        }
    }

    if state.active == ActiveState::Active {
        assert_eq!(active.len(), 1);
        assert_eq!(state.current_beep_id, Some(active[0].id));
        assert_eq!(open.len(), 1);
        assert_eq!(state.current_uptime_id, Some(open[0].id));
    } else {
        assert!(active.is_empty());
        assert!(open.is_empty());
        assert_eq!(state.current_beep_id, None);
        assert_eq!(state.current_uptime_id, None);
    }

    for beep in h.beeps() {
        if beep.status != BeepStatus::Active {
            assert!(beep.updated_at.is_some());
        }
        if let Some(fired_at) = beep.fired_at {
            assert!(fired_at >= beep.created_at, "beep fired before it was created: {beep:?}");
        }
    }
}
