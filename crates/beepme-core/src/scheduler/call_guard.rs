//! Maps telephony state onto scheduler pause/resume decisions.
//!
//! ```text
//! in_call false -> true   while Active             => Pause
//! in_call true  -> false  while InactiveAfterCall  => Resume
//! any other change of in_call                      => Record
//! in_call unchanged                                => Ignore
//! ```

use serde::{Deserialize, Serialize};

use super::state::ActiveState;

/// Raw telephony states as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Ringing,
    OffHook,
}

impl CallState {
    /// Ringing already counts as a call: the user cannot answer a beep.
    pub fn is_in_call(self) -> bool {
        !matches!(self, CallState::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Cancel the outstanding beep and remember to resume.
    Pause,
    /// Call ended after a pause: start scheduling from scratch.
    Resume,
    /// Only the persisted call flag changes.
    Record,
    Ignore,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CallInterruptGuard;

impl CallInterruptGuard {
    pub fn decide(previously_in_call: bool, in_call: bool, active: ActiveState) -> GuardDecision {
        match (previously_in_call, in_call, active) {
            (false, true, ActiveState::Active) => GuardDecision::Pause,
            (true, false, ActiveState::InactiveAfterCall) => GuardDecision::Resume,
            (prev, now, _) if prev != now => GuardDecision::Record,
            _ => GuardDecision::Ignore,
        }
    }
}
