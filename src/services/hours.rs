use chrono::{Datelike, NaiveDate};

use crate::models::{DayWindow, ScheduleConfig, Window};

/// Bookable window for `date`. A weekday without a row is closed, never open.
pub fn window_for(schedule: &ScheduleConfig, date: NaiveDate) -> DayWindow {
    let weekday = date.weekday().num_days_from_sunday() as u8;

    match schedule.hours_for(weekday) {
        Some(hours) if hours.is_open && hours.open_time < hours.close_time => {
            DayWindow::Open(Window {
                open: hours.open_time,
                close: hours.close_time,
            })
        }
        Some(_) => DayWindow::Closed,
        None => {
            tracing::debug!(%date, weekday, "no business hours configured for weekday, treating as closed");
            DayWindow::Closed
        }
    }
}
