//! Timer profiles: the distribution of waits between beeps.
//!
//! A profile is pure. Given the same random source it always returns the
//! same sequence of waits, which keeps schedules reproducible in tests.

use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Longest wait any profile produces: one leap year.
pub const MAX_WAIT_SECS: u64 = 366 * 24 * 3600;

/// Distribution used to pick the wait before the next beep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TimerProfile {
    /// Every wait in `[min_secs, max_secs]` is equally likely.
    Uniform { min_secs: u64, max_secs: u64 },
    /// Memoryless waits around `mean_secs`, clamped into `[min_secs, max_secs]`.
    Exponential {
        mean_secs: u64,
        min_secs: u64,
        max_secs: u64,
    },
    /// Always the same wait.
    Fixed { secs: u64 },
}

impl Default for TimerProfile {
    fn default() -> Self {
        TimerProfile::Exponential {
            mean_secs: 1800,
            min_secs: 120,
            max_secs: 5400,
        }
    }
}

fn ordered(a: u64, b: u64) -> (u64, u64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl TimerProfile {
    /// Draw the next wait. Never negative, never above [`MAX_WAIT_SECS`].
    pub fn next_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let secs = match *self {
            TimerProfile::Uniform { min_secs, max_secs } => {
                let (lo, hi) = ordered(min_secs, max_secs);
                rng.gen_range(lo..=hi)
            }
            TimerProfile::Exponential {
                mean_secs,
                min_secs,
                max_secs,
            } => {
                let (lo, hi) = ordered(min_secs, max_secs);
                // Inverse CDF; 1 - u keeps the argument of ln in (0, 1].
                let u: f64 = rng.gen();
                let sample = -(mean_secs as f64) * (1.0 - u).ln();
                if sample.is_finite() {
                    (sample.round() as u64).clamp(lo, hi)
                } else {
                    hi
                }
            }
            TimerProfile::Fixed { secs } => secs,
        };
        Duration::seconds(secs.min(MAX_WAIT_SECS) as i64)
    }
}
