pub mod booking;
pub mod schedule;
pub mod slot;

pub use booking::{Booking, BookingStatus, ServiceItem};
pub use schedule::{DaySchedule, ScheduleOverride};
pub use slot::SlotTime;
