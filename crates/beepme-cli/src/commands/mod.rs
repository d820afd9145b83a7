pub mod call;
pub mod config;
pub mod scheduler;
pub mod stats;

use std::sync::Arc;

use beepme_core::storage::data_dir;
use beepme_core::{BeepScheduler, Config, Database, SchedulerSettings};

use crate::host::{AlarmFile, LogNotifier};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Scheduler wired to the on-disk database, alarm file and log notifier.
pub struct Host {
    pub scheduler: BeepScheduler<Database>,
    pub alarms: Arc<AlarmFile>,
}

impl Host {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let db = Database::open(config.test_mode)?;
        let alarms = Arc::new(AlarmFile::in_dir(&data_dir()?, config.test_mode));
        let scheduler = BeepScheduler::new(
            db,
            SchedulerSettings::from_config(&config),
            alarms.clone(),
            Arc::new(LogNotifier),
        )?;
        Ok(Self { scheduler, alarms })
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
