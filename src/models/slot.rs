use std::fmt;

use anyhow::bail;
use chrono::{NaiveTime, Timelike};

/// Minute-of-day start time of a bookable slot.
///
/// Ordering and equality follow the minute value, so the occupancy join
/// between grid slots and stored bookings can never drift with display
/// formatting. The 12-hour label ("9:00 AM") is produced only at the API
/// boundary via `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(u16);

impl SlotTime {
    pub fn new(minutes: u16) -> Self {
        SlotTime(minutes)
    }

    pub fn from_naive_time(t: NaiveTime) -> Self {
        SlotTime((t.hour() * 60 + t.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Parse either the storage form ("13:30", "13:30:00") or the display
    /// form ("1:30 PM").
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();

        if let Some((time_part, period)) = s.rsplit_once(' ') {
            let period = period.trim();
            if period.eq_ignore_ascii_case("am") || period.eq_ignore_ascii_case("pm") {
                let (hour, minute) = split_hour_minute(time_part)?;
                if !(1..=12).contains(&hour) || minute > 59 {
                    bail!("time out of range: {s}");
                }
                let is_pm = period.eq_ignore_ascii_case("pm");
                let hour24 = match (hour, is_pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                };
                return Ok(SlotTime(hour24 * 60 + minute));
            }
        }

        let (hour, minute) = split_hour_minute(s)?;
        if hour > 23 || minute > 59 {
            bail!("time out of range: {s}");
        }
        Ok(SlotTime(hour * 60 + minute))
    }

    /// Storage form ("HH:MM") used as the occupancy join key.
    pub fn storage(self) -> String {
        format!("{:02}:{:02}", self.0 / 60, self.0 % 60)
    }

    /// Second-precision form used in schedule settings payloads.
    pub fn to_hms(self) -> String {
        format!("{:02}:{:02}:00", self.0 / 60, self.0 % 60)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 60;
        let mins = self.0 % 60;
        let period = if hours >= 12 { "PM" } else { "AM" };
        let display_hour = if hours == 0 {
            12
        } else if hours > 12 {
            hours - 12
        } else {
            hours
        };
        write!(f, "{display_hour}:{mins:02} {period}")
    }
}

fn split_hour_minute(s: &str) -> anyhow::Result<(u16, u16)> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        bail!("invalid time format: {s}");
    }
    let hour: u16 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u16 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if parts.len() == 3 {
        let _seconds: u16 = parts[2]
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid seconds in: {s}"))?;
    }
    Ok((hour, minute))
}
