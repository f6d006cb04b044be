use chrono::{Duration, NaiveTime};

use crate::models::{DayWindow, Window};

/// Candidate start times from `open`, every `granularity_minutes`, strictly before `close`.
pub fn candidate_starts(window: DayWindow, granularity_minutes: u32) -> Vec<NaiveTime> {
    let DayWindow::Open(window) = window else {
        return Vec::new();
    };
    if granularity_minutes == 0 {
        return Vec::new();
    }

    let step = Duration::minutes(granularity_minutes as i64);
    let mut starts = Vec::new();
    let mut current = window.open;
    while current < window.close {
        starts.push(current);
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    starts
}

/// End time of a job starting at `start`, or `None` if it runs past `close`.
pub fn fits(start: NaiveTime, duration_minutes: u32, window: &Window) -> Option<NaiveTime> {
    if duration_minutes == 0 || start < window.open {
        return None;
    }
    let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(duration_minutes as i64));
    if wrapped != 0 || end > window.close {
        return None;
    }
    Some(end)
}
