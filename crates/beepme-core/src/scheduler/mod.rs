//! Beep scheduler: the single owner of scheduler state.
//!
//! Every trigger (user toggle, wake-up timer, call state, process resume)
//! goes through one lock. Inside it, an operation runs as one storage
//! transaction that produces the next [`SchedulerState`], a list of
//! [`Event`]s and a list of side effects. Side effects (wake-up
//! registration, notifications) are only performed after the transaction
//! commits, so a storage failure leaves both the database and the host
//! untouched.
//!
//! ## State Transitions
//!
//! ```text
//! Inactive --set_active(true)--> Active --set_active(false)--> Inactive
//! Active --call starts--> InactiveAfterCall --call ends--> Active
//! InactiveAfterCall --set_active(false)--> Inactive
//! ```

mod call_guard;
mod collaborators;
mod state;

pub use call_guard::{CallInterruptGuard, CallState, GuardDecision};
pub use collaborators::{Clock, Notifier, SystemClock, WakeupTimer, BEEP_ALARM_KEY};
pub use state::{ActiveState, SchedulerState};

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use tracing::{debug, error, info, warn};

use crate::beep::{BeepStatus, BeepStore};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::storage::{Config, Storage};
use crate::timer::TimerProfile;
use crate::uptime::UptimeTracker;

/// Knobs the scheduler reads but never changes.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub profile: TimerProfile,
    /// Grace after a beep's fire time before it counts as overdue.
    pub response_window: Duration,
    pub test_mode: bool,
    /// Fixed seed for the random source; entropy when `None`.
    pub seed: Option<u64>,
}

impl SchedulerSettings {
    pub fn new(profile: TimerProfile) -> Self {
        Self {
            profile,
            response_window: Duration::seconds(60),
            test_mode: false,
            seed: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let settings = Self::new(config.timer_profile())
            .with_response_window(config.response_window())
            .with_test_mode(config.test_mode);
        match config.timer.seed {
            Some(seed) => settings.with_seed(seed),
            None => settings,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_response_window(mut self, window: Duration) -> Self {
        self.response_window = window;
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    RegisterWakeup(DateTime<Utc>),
    CancelWakeup,
    ShowOngoing,
    ClearNotifications,
    PresentBeep,
}

struct Core<S> {
    storage: S,
    state: SchedulerState,
    settings: SchedulerSettings,
    rng: Mcg128Xsl64,
}

/// One operation in progress, inside a storage transaction.
struct Step<'a, S> {
    db: &'a S,
    settings: &'a SchedulerSettings,
    rng: &'a mut Mcg128Xsl64,
    now: DateTime<Utc>,
    next: SchedulerState,
    events: Vec<Event>,
    effects: Vec<Effect>,
}

impl<'a, S: Storage> Step<'a, S> {
    fn beeps(&self) -> BeepStore<'a, S> {
        BeepStore::new(self.db)
    }

    fn uptimes(&self) -> UptimeTracker<'a, S> {
        UptimeTracker::new(self.db)
    }

    fn open_uptime(&mut self) -> Result<()> {
        let interval = self.uptimes().start_interval(self.now)?;
        info!(uptime_id = %interval.id, "uptime interval started");
        self.next.current_uptime_id = Some(interval.id);
        self.events.push(Event::UptimeStarted {
            uptime_id: interval.id,
            at: self.now,
        });
        Ok(())
    }

    fn close_uptime(&mut self) -> Result<()> {
        if let Some(id) = self.next.current_uptime_id.take() {
            let interval = self.uptimes().end_interval(id, self.now)?;
            info!(uptime_id = %id, "uptime interval ended");
            self.events.push(Event::UptimeEnded {
                uptime_id: id,
                at: interval.end.unwrap_or(self.now),
            });
        }
        Ok(())
    }

    fn schedule_beep(&mut self) -> Result<()> {
        if let Some(id) = self.next.current_beep_id {
            return Err(CoreError::BeepInFlight { id: id.0 });
        }
        let wait = self.settings.profile.next_interval(&mut *self.rng);
        let fire_at = self
            .now
            .checked_add_signed(wait)
            .ok_or(CoreError::TimeOutOfRange { what: "beep fire time" })?;
        let beep = self
            .beeps()
            .create(self.next.current_uptime_id, self.now, fire_at)?;
        info!(beep_id = %beep.id, %fire_at, wait_secs = wait.num_seconds(), "beep scheduled");
        self.next.current_beep_id = Some(beep.id);
        self.events.push(Event::BeepScheduled {
            beep_id: beep.id,
            fire_at,
            at: self.now,
        });
        self.effects.push(Effect::RegisterWakeup(fire_at));
        Ok(())
    }

    /// Move the current beep to a terminal status and forget it.
    fn resolve_beep(&mut self, status: BeepStatus) -> Result<()> {
        if let Some(id) = self.next.current_beep_id.take() {
            self.beeps().update_status(id, status, self.now)?;
            info!(beep_id = %id, %status, "beep resolved");
            self.events.push(Event::BeepStatusChanged {
                beep_id: id,
                status,
                at: self.now,
            });
        }
        Ok(())
    }

    fn activate(&mut self, resumed: bool) -> Result<()> {
        self.open_uptime()?;
        self.next.active = ActiveState::Active;
        self.schedule_beep()?;
        self.events.push(if resumed {
            Event::SchedulerResumed { at: self.now }
        } else {
            Event::SchedulerActivated { at: self.now }
        });
        self.effects.push(Effect::ShowOngoing);
        Ok(())
    }

    fn wind_down(&mut self, target: ActiveState) -> Result<()> {
        self.resolve_beep(BeepStatus::Cancelled)?;
        self.close_uptime()?;
        self.next.active = target;
        self.events.push(match target {
            ActiveState::InactiveAfterCall => Event::SchedulerPaused { at: self.now },
            _ => Event::SchedulerDeactivated { at: self.now },
        });
        self.effects.push(Effect::CancelWakeup);
        // A call pause keeps the ongoing notification up.
        if target == ActiveState::Inactive {
            self.effects.push(Effect::ClearNotifications);
        }
        Ok(())
    }

    /// Bring persisted state back in line after a restart or a kill.
    fn reconcile(&mut self) -> Result<()> {
        let active = self.next.is_active();
        self.repair_uptimes(active)?;
        self.cancel_stray_beeps(active)?;

        if !active {
            self.effects.push(Effect::CancelWakeup);
            self.effects.push(match self.next.active {
                ActiveState::InactiveAfterCall => Effect::ShowOngoing,
                _ => Effect::ClearNotifications,
            });
            return Ok(());
        }

        if self.next.current_uptime_id.is_none() {
            self.open_uptime()?;
        }

        match self.next.current_beep_id {
            Some(id) => {
                let record = self.beeps().get(id)?.ok_or(CoreError::NotFound {
                    entity: "beep",
                    id: id.0,
                })?;
                if record.status != BeepStatus::Active {
                    warn!(beep_id = %id, status = %record.status, "current beep already resolved");
                    self.next.current_beep_id = None;
                    self.schedule_beep()?;
                } else if record.is_overdue(self.now, self.settings.response_window) {
                    self.resolve_beep(BeepStatus::Expired)?;
                    self.schedule_beep()?;
                } else if record.has_fired() {
                    debug!(beep_id = %id, "beep already presented, awaiting answer");
                } else {
                    // Upsert by key, so this is harmless if the host still has it.
                    self.effects.push(Effect::RegisterWakeup(record.scheduled_for));
                }
            }
            None => self.schedule_beep()?,
        }

        self.effects.push(Effect::ShowOngoing);
        Ok(())
    }

    /// Drop dangling uptime references and close orphaned open intervals.
    fn repair_uptimes(&mut self, active: bool) -> Result<()> {
        let tracker = self.uptimes();

        if let Some(id) = self.next.current_uptime_id {
            match tracker.get(id)? {
                Some(interval) if interval.is_open() => {
                    if !active {
                        self.close_uptime()?;
                    }
                }
                _ => {
                    warn!(uptime_id = %id, "dropping reference to missing or closed uptime");
                    self.next.current_uptime_id = None;
                }
            }
        }

        for interval in tracker.open_intervals()? {
            if Some(interval.id) == self.next.current_uptime_id {
                continue;
            }
            let last_seen = self
                .beeps()
                .latest_activity_for_uptime(interval.id)?
                .unwrap_or(interval.start)
                .min(self.now);
            let closed = tracker.end_interval(interval.id, last_seen)?;
            let end = closed.end.unwrap_or(last_seen);
            warn!(uptime_id = %interval.id, %end, "closed orphaned uptime interval");
            self.events.push(Event::UptimeEnded {
                uptime_id: interval.id,
                at: end,
            });
        }
        Ok(())
    }

    /// Cancel every active beep except the one we keep tracking.
    fn cancel_stray_beeps(&mut self, active: bool) -> Result<()> {
        let keep = if active { self.next.current_beep_id } else { None };
        let store = self.beeps();
        for id in store.active_ids()? {
            if Some(id) == keep {
                continue;
            }
            store.update_status(id, BeepStatus::Cancelled, self.now)?;
            if Some(id) != self.next.current_beep_id {
                warn!(beep_id = %id, "cancelled stray active beep");
            }
            self.events.push(Event::BeepStatusChanged {
                beep_id: id,
                status: BeepStatus::Cancelled,
                at: self.now,
            });
        }
        if !active {
            self.next.current_beep_id = None;
        }
        Ok(())
    }
}

/// The experience-sampling scheduler.
///
/// Safe to share across threads; every public operation is serialized.
pub struct BeepScheduler<S> {
    core: Mutex<Core<S>>,
    wakeup: Arc<dyn WakeupTimer>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<S: Storage> BeepScheduler<S> {
    /// Create a scheduler, loading its state from `storage`.
    ///
    /// # Errors
    /// Returns an error if the persisted state cannot be read.
    pub fn new(
        storage: S,
        settings: SchedulerSettings,
        wakeup: Arc<dyn WakeupTimer>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let state = SchedulerState::load(&storage)?;
        let rng = match settings.seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        debug!(?state, "scheduler state loaded");
        Ok(Self {
            core: Mutex::new(Core {
                storage,
                state,
                settings,
                rng,
            }),
            wakeup,
            notifier,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Core<S>>> {
        self.core.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Current persisted state.
    pub fn snapshot(&self) -> Result<SchedulerState> {
        Ok(self.lock()?.state.clone())
    }

    /// Read-only access to storage, serialized with scheduler operations.
    pub fn with_storage<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R> {
        Ok(f(&self.lock()?.storage))
    }

    fn run<F>(&self, op: &'static str, f: F) -> Result<Vec<Event>>
    where
        F: FnOnce(&mut Step<'_, S>) -> Result<()>,
    {
        let mut guard = self.lock()?;
        let now = self.clock.now();
        let Core {
            storage,
            state,
            settings,
            rng,
        } = &mut *guard;

        let current = state.clone();
        let outcome = storage.transaction(|db| {
            let mut step = Step {
                db,
                settings: &*settings,
                rng: &mut *rng,
                now,
                next: current.clone(),
                events: Vec::new(),
                effects: Vec::new(),
            };
            f(&mut step)?;
            if step.next != current {
                step.next.save(db)?;
            }
            Ok((step.next, step.events, step.effects))
        });

        match outcome {
            Ok((next, events, effects)) => {
                *state = next;
                self.perform(&effects, settings.test_mode);
                Ok(events)
            }
            Err(err) => {
                if err.is_logic_error() {
                    error!(op, error = %err, "scheduler invariant violated");
                } else {
                    warn!(op, error = %err, "scheduler operation failed");
                }
                Err(err)
            }
        }
    }

    fn perform(&self, effects: &[Effect], test_mode: bool) {
        for effect in effects {
            match *effect {
                Effect::RegisterWakeup(at) => self.wakeup.register_at(BEEP_ALARM_KEY, at),
                Effect::CancelWakeup => self.wakeup.cancel(BEEP_ALARM_KEY),
                Effect::ShowOngoing => self.notifier.show_persistent_ongoing(test_mode),
                Effect::ClearNotifications => self.notifier.clear(),
                Effect::PresentBeep => self.notifier.present_beep(),
            }
        }
    }

    /// Turn the scheduler on or off. Repeating the current setting is a no-op.
    pub fn set_active(&self, active: bool) -> Result<Vec<Event>> {
        self.run("set_active", |step| {
            if active {
                if step.next.is_active() {
                    debug!("already active");
                    return Ok(());
                }
                step.activate(false)
            } else {
                if step.next.active == ActiveState::Inactive {
                    debug!("already inactive");
                    return Ok(());
                }
                step.wind_down(ActiveState::Inactive)
            }
        })
    }

    /// Reconcile persisted state with the current time.
    ///
    /// Running it twice without anything happening in between leaves the
    /// persisted state unchanged the second time.
    pub fn on_resume(&self) -> Result<Vec<Event>> {
        self.run("on_resume", |step| step.reconcile())
    }

    /// Schedule a beep when active and none is outstanding.
    pub fn schedule_next(&self) -> Result<Vec<Event>> {
        self.run("schedule_next", |step| {
            if !step.next.is_active() {
                debug!("not active, nothing to schedule");
                return Ok(());
            }
            step.schedule_beep()
        })
    }

    /// The wake-up timer elapsed.
    pub fn fire(&self) -> Result<Vec<Event>> {
        self.run("fire", |step| {
            if !step.next.is_active() {
                debug!("wake-up delivered while not active, ignoring");
                return Ok(());
            }
            let Some(id) = step.next.current_beep_id else {
                warn!("wake-up delivered without a scheduled beep");
                return Ok(());
            };
            let record = step.beeps().get(id)?.ok_or(CoreError::NotFound {
                entity: "beep",
                id: id.0,
            })?;
            if record.status != BeepStatus::Active {
                debug!(beep_id = %id, status = %record.status, "beep already resolved");
                return Ok(());
            }
            if record.has_fired() {
                debug!(beep_id = %id, "beep already presented");
                return Ok(());
            }
            step.beeps().mark_fired(id, step.now)?;
            info!(beep_id = %id, "beep fired");
            step.events.push(Event::BeepFired {
                beep_id: id,
                at: step.now,
            });
            step.effects.push(Effect::PresentBeep);
            Ok(())
        })
    }

    /// The user answered the current beep.
    pub fn accept_current(&self) -> Result<Vec<Event>> {
        self.run("accept_current", |step| {
            if step.next.current_beep_id.is_none() {
                debug!("no beep to accept");
                return Ok(());
            }
            step.resolve_beep(BeepStatus::Received)?;
            if step.next.is_active() {
                step.schedule_beep()?;
            }
            Ok(())
        })
    }

    /// Telephony state changed.
    pub fn on_call_interrupt(&self, in_call: bool) -> Result<Vec<Event>> {
        self.run("on_call_interrupt", |step| {
            let decision = CallInterruptGuard::decide(step.next.in_call, in_call, step.next.active);
            debug!(in_call, ?decision, "call state delivered");
            if decision == GuardDecision::Ignore {
                return Ok(());
            }
            step.next.in_call = in_call;
            step.events.push(Event::CallStateChanged {
                in_call,
                at: step.now,
            });
            match decision {
                GuardDecision::Pause => step.wind_down(ActiveState::InactiveAfterCall),
                GuardDecision::Resume => step.activate(true),
                GuardDecision::Record | GuardDecision::Ignore => Ok(()),
            }
        })
    }
}
