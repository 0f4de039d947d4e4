use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Second-precision "HH:MM:SS" time-of-day fields on the wire, accepting
/// the bare "HH:MM" form admin clients tend to send.
pub mod time_serde {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map_err(|_| format!("invalid time: {s}"))
    }

    pub mod hms {
        use super::*;

        pub fn serialize<S: Serializer>(t: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
            ser.serialize_str(&t.format("%H:%M:%S").to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
            let s = String::deserialize(de)?;
            parse(&s).map_err(serde::de::Error::custom)
        }
    }

    pub mod hms_opt {
        use super::*;

        pub fn serialize<S: Serializer>(t: &Option<NaiveTime>, ser: S) -> Result<S::Ok, S::Error> {
            match t {
                Some(t) => ser.serialize_some(&t.format("%H:%M:%S").to_string()),
                None => ser.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            de: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            let s: Option<String> = Option::deserialize(de)?;
            match s.as_deref().filter(|s| !s.is_empty()) {
                Some(s) => parse(s).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

/// Weekly operating-hours template, one row per weekday (0 = Sunday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: u8,
    pub is_open: bool,
    #[serde(with = "time_serde::hms")]
    pub open_time: NaiveTime,
    #[serde(with = "time_serde::hms")]
    pub close_time: NaiveTime,
    pub slot_duration_minutes: u16,
    pub max_bookings_per_slot: i64,
    #[serde(default, with = "time_serde::hms_opt")]
    pub break_start: Option<NaiveTime>,
    #[serde(default, with = "time_serde::hms_opt")]
    pub break_end: Option<NaiveTime>,
}

impl DaySchedule {
    /// Default row synthesized for weekdays the store has never seen:
    /// closed Sunday, otherwise 9-to-6 with an hour lunch break.
    pub fn default_for(day_of_week: u8) -> Self {
        DaySchedule {
            day_of_week,
            is_open: day_of_week != 0,
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            slot_duration_minutes: 60,
            max_bookings_per_slot: 1,
            break_start: NaiveTime::from_hms_opt(12, 0, 0),
            break_end: NaiveTime::from_hms_opt(13, 0, 0),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.day_of_week > 6 {
            anyhow::bail!("day_of_week must be 0-6, got {}", self.day_of_week);
        }
        if self.slot_duration_minutes == 0 {
            anyhow::bail!("slot_duration_minutes must be positive");
        }
        if self.max_bookings_per_slot < 1 {
            anyhow::bail!("max_bookings_per_slot must be at least 1");
        }
        if self.open_time >= self.close_time {
            anyhow::bail!("open_time must be before close_time");
        }
        match (self.break_start, self.break_end) {
            (Some(start), Some(end)) if start >= end => {
                anyhow::bail!("break_start must be before break_end");
            }
            (Some(_), None) | (None, Some(_)) => {
                anyhow::bail!("break_start and break_end must be set together");
            }
            _ => Ok(()),
        }
    }
}

/// Date-specific exception to the weekly template: a closure, or special
/// hours/capacity for a single date. At most one per date (upsert).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub date: NaiveDate,
    pub is_closed: bool,
    #[serde(default, with = "time_serde::hms_opt")]
    pub open_time: Option<NaiveTime>,
    #[serde(default, with = "time_serde::hms_opt")]
    pub close_time: Option<NaiveTime>,
    pub max_bookings_per_slot: Option<i64>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sunday_closed() {
        let sunday = DaySchedule::default_for(0);
        assert!(!sunday.is_open);
        let monday = DaySchedule::default_for(1);
        assert!(monday.is_open);
        assert_eq!(monday.slot_duration_minutes, 60);
        assert_eq!(monday.max_bookings_per_slot, 1);
        assert_eq!(monday.break_start, NaiveTime::from_hms_opt(12, 0, 0));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        for dow in 0..7 {
            DaySchedule::default_for(dow).validate().unwrap();
        }
    }

    #[test]
    fn test_validate_rejects_inverted_hours() {
        let mut day = DaySchedule::default_for(1);
        day.open_time = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        day.close_time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(day.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_half_break() {
        let mut day = DaySchedule::default_for(1);
        day.break_end = None;
        assert!(day.validate().is_err());
    }

    #[test]
    fn test_day_schedule_accepts_both_time_forms() {
        let with_seconds = r#"{"day_of_week":1,"is_open":true,"open_time":"09:00:00","close_time":"18:00:00","slot_duration_minutes":60,"max_bookings_per_slot":1,"break_start":"12:00:00","break_end":"13:00:00"}"#;
        let bare: &str = r#"{"day_of_week":1,"is_open":true,"open_time":"09:00","close_time":"18:00","slot_duration_minutes":60,"max_bookings_per_slot":1,"break_start":null,"break_end":null}"#;

        let a: DaySchedule = serde_json::from_str(with_seconds).unwrap();
        let b: DaySchedule = serde_json::from_str(bare).unwrap();
        assert_eq!(a.open_time, b.open_time);
        assert_eq!(a.break_start, NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(b.break_start, None);

        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["open_time"], "09:00:00");
    }

    #[test]
    fn test_validate_rejects_inverted_break() {
        let mut day = DaySchedule::default_for(1);
        day.break_start = NaiveTime::from_hms_opt(14, 0, 0);
        day.break_end = NaiveTime::from_hms_opt(13, 0, 0);
        assert!(day.validate().is_err());
    }
}
