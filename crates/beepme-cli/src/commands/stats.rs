use beepme_core::{Config, Database};
use chrono::Utc;
use clap::Subcommand;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's uptime and beep counts
    Today,
    /// Per-day history
    Days,
    /// All-time totals
    All,
}

pub fn run(action: StatsAction) -> CliResult {
    let config = Config::load()?;
    let db = Database::open(config.test_mode)?;
    let now = Utc::now();

    match action {
        StatsAction::Today => print_json(&db.stats_today(now)?),
        StatsAction::Days => print_json(&db.daily_stats(now)?),
        StatsAction::All => print_json(&db.stats_all(now)?),
    }
}
