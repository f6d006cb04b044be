use rusqlite::Connection;

use crate::db::queries;
use crate::models::ScheduleConfig;

const SCHEDULE_KEY: &str = "schedule";

/// Saved schedule, or an all-closed one when nothing usable is stored.
pub fn load_schedule(conn: &Connection, default_granularity: u32) -> anyhow::Result<ScheduleConfig> {
    let Some(raw) = queries::get_setting(conn, SCHEDULE_KEY)? else {
        return Ok(ScheduleConfig::closed(default_granularity));
    };

    match ScheduleConfig::from_json(&raw) {
        Ok(schedule) => Ok(schedule),
        Err(e) => {
            tracing::error!(error = %e, "stored schedule is invalid, treating every day as closed");
            Ok(ScheduleConfig::closed(default_granularity))
        }
    }
}

pub fn save_schedule(conn: &Connection, schedule: &ScheduleConfig) -> anyhow::Result<()> {
    schedule.validate()?;
    let raw = serde_json::to_string(schedule)?;
    queries::put_setting(conn, SCHEDULE_KEY, &raw)?;
    tracing::info!(hours = %schedule.to_human_readable(), "schedule updated");
    Ok(())
}
