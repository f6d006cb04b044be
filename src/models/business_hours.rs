use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::time::hhmm;

pub const MIN_GRANULARITY_MINUTES: u32 = 5;
pub const MAX_GRANULARITY_MINUTES: u32 = 240;

/// One weekday's opening hours. `weekday` counts from Sunday (0) to Saturday (6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessHours {
    pub weekday: u8,
    pub is_open: bool,
    #[serde(with = "hhmm")]
    pub open_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub close_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    pub business_hours: Vec<BusinessHours>,
    pub slot_granularity_minutes: u32,
}

impl ScheduleConfig {
    /// No configured weekdays, so every date resolves to closed.
    pub fn closed(slot_granularity_minutes: u32) -> Self {
        Self {
            business_hours: Vec::new(),
            slot_granularity_minutes,
        }
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let schedule: ScheduleConfig = serde_json::from_str(s)?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_GRANULARITY_MINUTES..=MAX_GRANULARITY_MINUTES)
            .contains(&self.slot_granularity_minutes)
        {
            return Err(anyhow::anyhow!(
                "slot granularity must be between {MIN_GRANULARITY_MINUTES} and {MAX_GRANULARITY_MINUTES} minutes, got {}",
                self.slot_granularity_minutes
            ));
        }

        let mut seen = [false; 7];
        for row in &self.business_hours {
            let idx = row.weekday as usize;
            if idx > 6 {
                return Err(anyhow::anyhow!("invalid weekday: {}", row.weekday));
            }
            if seen[idx] {
                return Err(anyhow::anyhow!("duplicate weekday: {}", row.weekday));
            }
            seen[idx] = true;

            if row.is_open && row.open_time >= row.close_time {
                return Err(anyhow::anyhow!(
                    "weekday {} opens at {} but closes at {}",
                    row.weekday,
                    row.open_time.format("%H:%M"),
                    row.close_time.format("%H:%M")
                ));
            }
        }
        Ok(())
    }

    pub fn hours_for(&self, weekday: u8) -> Option<&BusinessHours> {
        self.business_hours.iter().find(|h| h.weekday == weekday)
    }

    pub fn to_human_readable(&self) -> String {
        let names = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

        // Monday first, the way the site lists opening hours.
        let mut open: Vec<&BusinessHours> =
            self.business_hours.iter().filter(|h| h.is_open).collect();
        open.sort_by_key(|h| (h.weekday + 6) % 7);

        open.iter()
            .map(|h| {
                format!(
                    "{}: {}-{}",
                    names[h.weekday as usize],
                    h.open_time.format("%H:%M"),
                    h.close_time.format("%H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
