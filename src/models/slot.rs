use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::time::hhmm;

/// Raw bookable window for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWindow {
    Open(Window),
    Closed,
}

/// Half-open `[start, end)` interval on a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Interval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Everything taken on a date: non-cancelled bookings plus live holds.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    pub intervals: Vec<Interval>,
}

impl Occupancy {
    pub fn overlaps(&self, interval: &Interval) -> bool {
        self.intervals.iter().any(|taken| taken.overlaps(interval))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub available: bool,
}
