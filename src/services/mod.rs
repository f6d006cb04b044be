pub mod availability;
pub mod calendar;
pub mod clock;
pub mod hours;
pub mod ledger;
pub mod schedule;
pub mod slots;
pub mod sweeper;
