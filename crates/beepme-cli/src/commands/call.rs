use std::sync::Arc;

use beepme_core::{CallState, TelephonyHub, TelephonyObserver};
use clap::Subcommand;

use super::{print_json, CliResult, Host};

#[derive(Subcommand)]
pub enum CallAction {
    /// A call is ringing or in progress
    Start,
    /// The phone is idle again
    End,
}

pub fn run(action: CallAction) -> CliResult {
    let host = Host::open()?;
    let scheduler = Arc::new(host.scheduler);

    let hub = TelephonyHub::new();
    let handle = hub.register(scheduler);
    let state = match action {
        CallAction::Start => CallState::OffHook,
        CallAction::End => CallState::Idle,
    };
    let result = hub.publish(state);
    hub.deregister(handle);

    print_json(&result?)
}
