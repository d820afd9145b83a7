//! Narrow interfaces to the host: wake-up timer, notifications, clock.
//!
//! Implementations are called while the scheduler holds its lock and must
//! not call back into it.

use chrono::{DateTime, Utc};

/// Logical key under which the next-beep wake-up is registered.
pub const BEEP_ALARM_KEY: &str = "beepme.next_beep";

/// OS-level wake-up timer.
///
/// `register_at` is an upsert: registering under a key that already has a
/// pending wake-up replaces it. Delivery happens at or after `at`, at most
/// once per registration, and may never happen if the host kills the process.
pub trait WakeupTimer: Send + Sync {
    fn register_at(&self, key: &str, at: DateTime<Utc>);
    fn cancel(&self, key: &str);
}

/// User-facing notifications. Fire-and-forget.
pub trait Notifier: Send + Sync {
    /// Raise (or replace) the ongoing "scheduler is running" notification.
    fn show_persistent_ongoing(&self, test_mode: bool);
    /// Remove the ongoing notification and any export-in-progress one.
    fn clear(&self);
    /// Prompt the user to record an observation.
    fn present_beep(&self);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
