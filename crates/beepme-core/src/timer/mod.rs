mod profile;

pub use profile::{TimerProfile, MAX_WAIT_SECS};
