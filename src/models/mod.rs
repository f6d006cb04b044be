pub mod booking;
pub mod business_hours;
pub mod hold;
pub mod slot;
pub mod time;

pub use booking::{Booking, BookingStatus};
pub use business_hours::{BusinessHours, ScheduleConfig};
pub use hold::SlotHold;
pub use slot::{DayWindow, Interval, Occupancy, SlotAvailability, Window};
