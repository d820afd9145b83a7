use beepme_core::{SchedulerState, BEEP_ALARM_KEY};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;
use tracing::debug;

use super::{print_json, CliResult, Host};

#[derive(Subcommand)]
pub enum SchedulerAction {
    /// Switch the beeper on
    Start,
    /// Switch the beeper off
    Stop,
    /// Reconcile persisted state (run at startup)
    Resume,
    /// Deliver the wake-up now, regardless of the alarm time
    Fire,
    /// Answer the current beep
    Accept,
    /// Deliver the wake-up if it is due
    Tick,
    /// Print scheduler state as JSON
    Status,
}

#[derive(Serialize)]
struct StatusView {
    #[serde(flatten)]
    state: SchedulerState,
    next_wakeup: Option<DateTime<Utc>>,
}

pub fn run(action: SchedulerAction) -> CliResult {
    let host = Host::open()?;
    let scheduler = &host.scheduler;

    let events = match action {
        SchedulerAction::Start => scheduler.set_active(true)?,
        SchedulerAction::Stop => scheduler.set_active(false)?,
        SchedulerAction::Resume => scheduler.on_resume()?,
        SchedulerAction::Fire => scheduler.fire()?,
        SchedulerAction::Accept => scheduler.accept_current()?,
        SchedulerAction::Tick => match host.alarms.take_due(BEEP_ALARM_KEY, Utc::now()) {
            Some(due) => {
                debug!(%due, "wake-up due");
                scheduler.fire()?
            }
            None => Vec::new(),
        },
        SchedulerAction::Status => {
            return print_json(&StatusView {
                state: scheduler.snapshot()?,
                next_wakeup: host.alarms.pending(BEEP_ALARM_KEY),
            });
        }
    };

    print_json(&events)
}
