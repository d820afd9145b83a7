use beepme_core::{Config, ConfigError};
use clap::Subcommand;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value (e.g. "timer.profile", "timer.mean_secs", "test_mode")
    Get { key: String },
    /// Change one value; "none" clears `timer.seed`
    Set { key: String, value: String },
    /// Print the whole configuration as JSON
    List,
    /// Restore the default timer profile and leave test mode
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    let mut config = Config::load()?;

    match action {
        ConfigAction::Get { key } => {
            let value = config.get(&key).ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            eprintln!("{key} = {}", config.get(&key).unwrap_or_default());
            print_json(&config)
        }
        ConfigAction::List => print_json(&config),
        ConfigAction::Reset => {
            config = Config::default();
            config.save()?;
            print_json(&config)
        }
    }
}
