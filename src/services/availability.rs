use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::models::{DayWindow, Interval, Occupancy, ScheduleConfig, SlotAvailability};
use crate::services::hours::window_for;
use crate::services::ledger::Ledger;
use crate::services::slots::{candidate_starts, fits};

/// Longest job the evaluator will consider, one full day.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// Answers availability questions against one schedule at one instant.
pub struct Evaluator<'a> {
    schedule: &'a ScheduleConfig,
    ledger: &'a Ledger,
    /// UTC, for hold liveness.
    now: NaiveDateTime,
    /// Business-local wall clock, for hiding slots that already started.
    local_now: NaiveDateTime,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        schedule: &'a ScheduleConfig,
        ledger: &'a Ledger,
        now: NaiveDateTime,
        utc_offset: Duration,
    ) -> Self {
        Self {
            schedule,
            ledger,
            now,
            local_now: now + utc_offset,
        }
    }

    /// Every candidate start on `date` that fits `duration_minutes`, each marked
    /// available unless occupied or already in the past. Non-fitting starts are omitted.
    pub fn slots_for(
        &self,
        conn: &Connection,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> anyhow::Result<Vec<SlotAvailability>> {
        check_duration(duration_minutes)?;
        if window_for(self.schedule, date) == DayWindow::Closed {
            return Ok(Vec::new());
        }
        let occupancy = self.ledger.occupancy(conn, date, self.now)?;
        Ok(self.evaluate_day(date, duration_minutes, &occupancy))
    }

    /// One entry per calendar day of `year`-`month`: true iff that day has an available slot.
    pub fn month_availability(
        &self,
        conn: &Connection,
        year: i32,
        month: u32,
        duration_minutes: u32,
    ) -> anyhow::Result<BTreeMap<NaiveDate, bool>> {
        check_duration(duration_minutes)?;
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow::anyhow!("invalid month: {year}-{month}"))?;

        // One read transaction so every day is judged against the same snapshot.
        let tx = conn.unchecked_transaction()?;
        let mut days = BTreeMap::new();
        for date in first.iter_days().take_while(|d| d.month() == month) {
            let has_free = self
                .slots_for(&tx, date, duration_minutes)?
                .iter()
                .any(|slot| slot.available);
            days.insert(date, has_free);
        }
        tx.commit()?;
        Ok(days)
    }

    /// Checks that `[interval.start, interval.end)` is a slot this schedule
    /// would offer on `date` right now, ignoring occupancy. Returns a
    /// customer-facing reason otherwise.
    pub fn validate_offer(&self, date: NaiveDate, interval: &Interval) -> Result<(), String> {
        let DayWindow::Open(window) = window_for(self.schedule, date) else {
            return Err(format!("We are closed on {date}."));
        };
        if interval.start >= interval.end {
            return Err("The end time must be after the start time.".to_string());
        }
        let duration_minutes = (interval.end - interval.start).num_minutes() as u32;

        if !candidate_starts(DayWindow::Open(window), self.schedule.slot_granularity_minutes)
            .contains(&interval.start)
        {
            return Err(format!(
                "{} is not an offered start time. We're available: {}",
                interval.start.format("%H:%M"),
                self.schedule.to_human_readable()
            ));
        }
        if fits(interval.start, duration_minutes, &window) != Some(interval.end) {
            return Err(format!(
                "That job runs past closing time ({}).",
                window.close.format("%H:%M")
            ));
        }
        if date.and_time(interval.start) <= self.local_now {
            return Err("That time has already passed.".to_string());
        }
        Ok(())
    }

    fn evaluate_day(
        &self,
        date: NaiveDate,
        duration_minutes: u32,
        occupancy: &Occupancy,
    ) -> Vec<SlotAvailability> {
        let DayWindow::Open(window) = window_for(self.schedule, date) else {
            return Vec::new();
        };

        candidate_starts(DayWindow::Open(window), self.schedule.slot_granularity_minutes)
            .into_iter()
            .filter_map(|start| {
                let end = fits(start, duration_minutes, &window)?;
                let upcoming = date.and_time(start) > self.local_now;
                let free = !occupancy.overlaps(&Interval::new(start, end));
                Some(SlotAvailability {
                    time: start,
                    available: upcoming && free,
                })
            })
            .collect()
    }
}

fn check_duration(duration_minutes: u32) -> anyhow::Result<()> {
    anyhow::ensure!(
        (1..=MAX_DURATION_MINUTES).contains(&duration_minutes),
        "duration must be between 1 and {MAX_DURATION_MINUTES} minutes, got {duration_minutes}"
    );
    Ok(())
}
