use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::beep::{BeepId, BeepStatus};
use crate::uptime::UptimeId;

/// Every state change in the scheduler produces an Event.
/// Hosts print or forward them; tests assert on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SchedulerActivated {
        at: DateTime<Utc>,
    },
    SchedulerDeactivated {
        at: DateTime<Utc>,
    },
    /// A call started while active; scheduling resumes when it ends.
    SchedulerPaused {
        at: DateTime<Utc>,
    },
    SchedulerResumed {
        at: DateTime<Utc>,
    },
    BeepScheduled {
        beep_id: BeepId,
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The wake-up elapsed and the user was prompted.
    BeepFired {
        beep_id: BeepId,
        at: DateTime<Utc>,
    },
    BeepStatusChanged {
        beep_id: BeepId,
        status: BeepStatus,
        at: DateTime<Utc>,
    },
    UptimeStarted {
        uptime_id: UptimeId,
        at: DateTime<Utc>,
    },
    UptimeEnded {
        uptime_id: UptimeId,
        at: DateTime<Utc>,
    },
    CallStateChanged {
        in_call: bool,
        at: DateTime<Utc>,
    },
}
