use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::services::schedule::{self, DayResolution};
use crate::services::slots;

/// Same-day bookings must start strictly more than this many minutes after
/// the current wall-clock minute.
pub const MIN_LEAD_TIME_MINUTES: u32 = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub time: String,
    pub available: bool,
    pub remaining_slots: i64,
    pub max_slots: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettings {
    pub open_time: String,
    pub close_time: String,
    pub slot_duration: u16,
    pub max_bookings_per_slot: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: String,
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub slots: Vec<SlotAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<EffectiveSettings>,
}

/// Bookable slots for one date: resolve the day, generate the grid,
/// subtract live occupancy, and for today drop slots inside the lead-time
/// buffer. `now` is supplied by the caller so the math stays deterministic.
pub fn get_availability(
    conn: &Connection,
    date: NaiveDate,
    now: NaiveDateTime,
) -> anyhow::Result<DayAvailability> {
    let date_str = date.format("%Y-%m-%d").to_string();

    let day = match schedule::resolve_day(conn, date)? {
        DayResolution::Closed { reason } => {
            return Ok(DayAvailability {
                date: date_str,
                is_open: false,
                reason: Some(reason),
                slots: vec![],
                settings: None,
            });
        }
        DayResolution::Open(day) => day,
    };

    let grid = slots::generate_slots(
        day.open_time,
        day.close_time,
        day.slot_duration_minutes,
        day.break_window,
    );

    let counts = queries::booking_counts_for_date(conn, date)?;

    let mut available_slots: Vec<SlotAvailability> = grid
        .iter()
        .map(|slot| {
            let occupied = counts.get(&slot.storage()).copied().unwrap_or(0);
            let remaining = (day.max_bookings_per_slot - occupied).max(0);
            SlotAvailability {
                time: slot.to_string(),
                available: remaining > 0,
                remaining_slots: remaining,
                max_slots: day.max_bookings_per_slot,
            }
        })
        .collect();

    // Same-day requests lose slots that start within the lead-time buffer.
    // Future dates are never time-filtered.
    if date == now.date() {
        let current_minutes = now.hour() * 60 + now.minute();
        let cutoff = current_minutes + MIN_LEAD_TIME_MINUTES;
        let mut kept = Vec::with_capacity(available_slots.len());
        for (slot, view) in grid.iter().zip(available_slots) {
            if u32::from(slot.minutes()) > cutoff {
                kept.push(view);
            }
        }
        available_slots = kept;
    }

    Ok(DayAvailability {
        date: date_str,
        is_open: true,
        reason: None,
        slots: available_slots,
        settings: Some(EffectiveSettings {
            open_time: day.open_time.to_hms(),
            close_time: day.close_time.to_hms(),
            slot_duration: day.slot_duration_minutes,
            max_bookings_per_slot: day.max_bookings_per_slot,
        }),
    })
}
