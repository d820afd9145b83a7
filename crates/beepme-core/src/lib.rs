//! # BeepMe Core Library
//!
//! Core logic for BeepMe, an experience-sampling beeper. While the user has
//! the beeper switched on, it raises a beep at a random moment; the user
//! answers it (or lets it expire) and the next one is scheduled. The time
//! spent switched on is recorded as uptime intervals.
//!
//! The library is host-agnostic: wake-up timers, notifications and the clock
//! are traits that the host (the CLI, or a platform app) implements.
//!
//! ## Key Components
//!
//! - [`BeepScheduler`]: the scheduler state machine and single state owner
//! - [`BeepStore`] / [`UptimeTracker`]: typed access to beep records and uptime
//! - [`TimerProfile`]: random inter-beep interval distributions
//! - [`TelephonyHub`]: routes call state to the scheduler
//! - [`Database`]: SQLite persistence and history statistics
//! - [`Config`]: TOML configuration

pub mod beep;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod storage;
pub mod telephony;
pub mod timer;
pub mod uptime;

pub use beep::{BeepId, BeepRecord, BeepStatus, BeepStore};
pub use error::{ConfigError, CoreError, StorageError};
pub use events::Event;
pub use scheduler::{
    ActiveState, BeepScheduler, CallInterruptGuard, CallState, Clock, GuardDecision, Notifier,
    SchedulerSettings, SchedulerState, SystemClock, WakeupTimer, BEEP_ALARM_KEY,
};
pub use storage::{Config, Database, DayStats, Stats, Storage};
pub use telephony::{CallInterruptHandler, ListenerHandle, TelephonyHub, TelephonyObserver};
pub use timer::TimerProfile;
pub use uptime::{UptimeId, UptimeInterval, UptimeTracker};
