use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::SlotTime;

/// The merged template + override configuration the grid and capacity math
/// run against for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveDay {
    pub open_time: SlotTime,
    pub close_time: SlotTime,
    pub slot_duration_minutes: u16,
    pub max_bookings_per_slot: i64,
    pub break_window: Option<(SlotTime, SlotTime)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DayResolution {
    Open(EffectiveDay),
    Closed { reason: String },
}

impl DayResolution {
    fn closed(reason: &str) -> Self {
        DayResolution::Closed {
            reason: reason.to_string(),
        }
    }
}

/// Merge the weekly template row with any override for the exact date.
///
/// An override marked closed always wins, carrying its reason. A template
/// day marked closed stays closed only when no override exists for the
/// date; a non-closing override opens it with the override's hours.
/// Overrides can replace hours and capacity; slot duration and the break
/// window always come from the template.
pub fn resolve_day(conn: &Connection, date: NaiveDate) -> anyhow::Result<DayResolution> {
    let day_of_week = date.weekday().num_days_from_sunday() as u8;

    let Some(day) = queries::get_day_schedule(conn, day_of_week)? else {
        return Ok(DayResolution::closed("Schedule not configured"));
    };

    let override_ = queries::get_override(conn, date)?;

    if let Some(ov) = &override_ {
        if ov.is_closed {
            let reason = ov.reason.clone().unwrap_or_else(|| "Closed".to_string());
            return Ok(DayResolution::Closed { reason });
        }
    }

    if !day.is_open && override_.is_none() {
        return Ok(DayResolution::closed("Closed"));
    }

    let (open_time, close_time, max_bookings_per_slot) = match &override_ {
        Some(ov) => (
            ov.open_time.unwrap_or(day.open_time),
            ov.close_time.unwrap_or(day.close_time),
            ov.max_bookings_per_slot.unwrap_or(day.max_bookings_per_slot),
        ),
        None => (day.open_time, day.close_time, day.max_bookings_per_slot),
    };

    let break_window = match (day.break_start, day.break_end) {
        (Some(start), Some(end)) => Some((
            SlotTime::from_naive_time(start),
            SlotTime::from_naive_time(end),
        )),
        _ => None,
    };

    Ok(DayResolution::Open(EffectiveDay {
        open_time: SlotTime::from_naive_time(open_time),
        close_time: SlotTime::from_naive_time(close_time),
        slot_duration_minutes: day.slot_duration_minutes,
        max_bookings_per_slot,
        break_window,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{DaySchedule, ScheduleOverride};
    use chrono::NaiveTime;

    fn setup_db() -> Connection {
        let mut conn = db::init_db(":memory:").unwrap();
        let rows: Vec<DaySchedule> = (0..7).map(DaySchedule::default_for).collect();
        queries::put_template(&mut conn, &rows).unwrap();
        conn
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_unconfigured_schedule() {
        // No template rows at all.
        let conn = db::init_db(":memory:").unwrap();
        let resolution = resolve_day(&conn, date("2030-06-17")).unwrap();
        assert_eq!(
            resolution,
            DayResolution::Closed {
                reason: "Schedule not configured".to_string()
            }
        );
    }

    #[test]
    fn test_regular_open_day() {
        let conn = setup_db();
        // 2030-06-17 is a Monday.
        let resolution = resolve_day(&conn, date("2030-06-17")).unwrap();
        let DayResolution::Open(day) = resolution else {
            panic!("expected open day");
        };
        assert_eq!(day.open_time, SlotTime::parse("09:00").unwrap());
        assert_eq!(day.close_time, SlotTime::parse("18:00").unwrap());
        assert_eq!(day.slot_duration_minutes, 60);
        assert_eq!(day.max_bookings_per_slot, 1);
        assert!(day.break_window.is_some());
    }

    #[test]
    fn test_template_closed_day() {
        let conn = setup_db();
        // 2030-06-16 is a Sunday, closed by default.
        let resolution = resolve_day(&conn, date("2030-06-16")).unwrap();
        assert_eq!(
            resolution,
            DayResolution::Closed {
                reason: "Closed".to_string()
            }
        );
    }

    #[test]
    fn test_closing_override_wins_with_reason() {
        let conn = setup_db();
        let d = date("2030-06-17");
        queries::upsert_override(
            &conn,
            &ScheduleOverride {
                date: d,
                is_closed: true,
                open_time: None,
                close_time: None,
                max_bookings_per_slot: None,
                reason: Some("Christmas".to_string()),
            },
        )
        .unwrap();

        let resolution = resolve_day(&conn, d).unwrap();
        assert_eq!(
            resolution,
            DayResolution::Closed {
                reason: "Christmas".to_string()
            }
        );
    }

    #[test]
    fn test_closing_override_without_reason() {
        let conn = setup_db();
        let d = date("2030-06-17");
        queries::upsert_override(
            &conn,
            &ScheduleOverride {
                date: d,
                is_closed: true,
                open_time: None,
                close_time: None,
                max_bookings_per_slot: None,
                reason: None,
            },
        )
        .unwrap();

        assert_eq!(
            resolve_day(&conn, d).unwrap(),
            DayResolution::Closed {
                reason: "Closed".to_string()
            }
        );
    }

    #[test]
    fn test_override_special_hours_and_capacity() {
        let conn = setup_db();
        let d = date("2030-06-17");
        queries::upsert_override(
            &conn,
            &ScheduleOverride {
                date: d,
                is_closed: false,
                open_time: NaiveTime::from_hms_opt(10, 0, 0),
                close_time: None,
                max_bookings_per_slot: Some(3),
                reason: Some("Extra staff".to_string()),
            },
        )
        .unwrap();

        let DayResolution::Open(day) = resolve_day(&conn, d).unwrap() else {
            panic!("expected open day");
        };
        // Override replaces open time and capacity, template supplies the rest.
        assert_eq!(day.open_time, SlotTime::parse("10:00").unwrap());
        assert_eq!(day.close_time, SlotTime::parse("18:00").unwrap());
        assert_eq!(day.max_bookings_per_slot, 3);
        assert_eq!(day.slot_duration_minutes, 60);
    }

    #[test]
    fn test_non_closing_override_opens_template_closed_day() {
        let conn = setup_db();
        // Sunday is closed in the template, but a special-hours override
        // for the date proceeds open.
        let d = date("2030-06-16");
        queries::upsert_override(
            &conn,
            &ScheduleOverride {
                date: d,
                is_closed: false,
                open_time: NaiveTime::from_hms_opt(10, 0, 0),
                close_time: NaiveTime::from_hms_opt(14, 0, 0),
                max_bookings_per_slot: None,
                reason: Some("Holiday rush".to_string()),
            },
        )
        .unwrap();

        let DayResolution::Open(day) = resolve_day(&conn, d).unwrap() else {
            panic!("expected open day");
        };
        assert_eq!(day.open_time, SlotTime::parse("10:00").unwrap());
        assert_eq!(day.close_time, SlotTime::parse("14:00").unwrap());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let conn = setup_db();
        let d = date("2030-06-17");
        let first = resolve_day(&conn, d).unwrap();
        let second = resolve_day(&conn, d).unwrap();
        assert_eq!(first, second);
    }
}
