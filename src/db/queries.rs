use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, DaySchedule, ScheduleOverride, SlotTime};

const TIME_FMT: &str = "%H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Weekly template ──

pub fn get_day_schedule(conn: &Connection, day_of_week: u8) -> anyhow::Result<Option<DaySchedule>> {
    let result = conn.query_row(
        "SELECT day_of_week, is_open, open_time, close_time, slot_duration_minutes, max_bookings_per_slot, break_start, break_end
         FROM schedule_settings WHERE day_of_week = ?1",
        params![day_of_week],
        |row| Ok(parse_day_row(row)),
    );

    match result {
        Ok(day) => Ok(Some(day?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All 7 weekday rows, synthesizing defaults for weekdays the store has
/// never been given.
pub fn get_template(conn: &Connection) -> anyhow::Result<Vec<DaySchedule>> {
    let mut stmt = conn.prepare(
        "SELECT day_of_week, is_open, open_time, close_time, slot_duration_minutes, max_bookings_per_slot, break_start, break_end
         FROM schedule_settings ORDER BY day_of_week ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_day_row(row)))?;

    let mut by_day: HashMap<u8, DaySchedule> = HashMap::new();
    for row in rows {
        let day = row??;
        by_day.insert(day.day_of_week, day);
    }

    Ok((0..7)
        .map(|dow| by_day.remove(&dow).unwrap_or_else(|| DaySchedule::default_for(dow)))
        .collect())
}

/// Full template replace. All rows are upserted inside one transaction so a
/// failure can never leave mismatched weekday rows behind.
pub fn put_template(conn: &mut Connection, rows: &[DaySchedule]) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    for day in rows {
        tx.execute(
            "INSERT INTO schedule_settings
                 (day_of_week, is_open, open_time, close_time, slot_duration_minutes, max_bookings_per_slot, break_start, break_end, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
             ON CONFLICT(day_of_week) DO UPDATE SET
               is_open = excluded.is_open,
               open_time = excluded.open_time,
               close_time = excluded.close_time,
               slot_duration_minutes = excluded.slot_duration_minutes,
               max_bookings_per_slot = excluded.max_bookings_per_slot,
               break_start = excluded.break_start,
               break_end = excluded.break_end,
               updated_at = excluded.updated_at",
            params![
                day.day_of_week,
                day.is_open as i32,
                day.open_time.format(TIME_FMT).to_string(),
                day.close_time.format(TIME_FMT).to_string(),
                day.slot_duration_minutes,
                day.max_bookings_per_slot,
                day.break_start.map(|t| t.format(TIME_FMT).to_string()),
                day.break_end.map(|t| t.format(TIME_FMT).to_string()),
            ],
        )?;
    }
    tx.commit()?;
    Ok(())
}

fn parse_day_row(row: &rusqlite::Row) -> anyhow::Result<DaySchedule> {
    let day_of_week: u8 = row.get(0)?;
    let is_open: bool = row.get::<_, i32>(1)? != 0;
    let open_time: String = row.get(2)?;
    let close_time: String = row.get(3)?;
    let slot_duration_minutes: u16 = row.get(4)?;
    let max_bookings_per_slot: i64 = row.get(5)?;
    let break_start: Option<String> = row.get(6)?;
    let break_end: Option<String> = row.get(7)?;

    Ok(DaySchedule {
        day_of_week,
        is_open,
        open_time: parse_stored_time(&open_time)?,
        close_time: parse_stored_time(&close_time)?,
        slot_duration_minutes,
        max_bookings_per_slot,
        break_start: break_start.as_deref().map(parse_stored_time).transpose()?,
        break_end: break_end.as_deref().map(parse_stored_time).transpose()?,
    })
}

fn parse_stored_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| anyhow::anyhow!("invalid stored time: {s}"))
}

// ── Date overrides ──

pub fn get_override(conn: &Connection, date: NaiveDate) -> anyhow::Result<Option<ScheduleOverride>> {
    let result = conn.query_row(
        "SELECT date, is_closed, open_time, close_time, max_bookings_per_slot, reason
         FROM schedule_overrides WHERE date = ?1",
        params![date.format(DATE_FMT).to_string()],
        |row| Ok(parse_override_row(row)),
    );

    match result {
        Ok(ov) => Ok(Some(ov?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn upsert_override(conn: &Connection, ov: &ScheduleOverride) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO schedule_overrides (date, is_closed, open_time, close_time, max_bookings_per_slot, reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(date) DO UPDATE SET
           is_closed = excluded.is_closed,
           open_time = excluded.open_time,
           close_time = excluded.close_time,
           max_bookings_per_slot = excluded.max_bookings_per_slot,
           reason = excluded.reason",
        params![
            ov.date.format(DATE_FMT).to_string(),
            ov.is_closed as i32,
            ov.open_time.map(|t| t.format(TIME_FMT).to_string()),
            ov.close_time.map(|t| t.format(TIME_FMT).to_string()),
            ov.max_bookings_per_slot,
            ov.reason,
        ],
    )?;
    Ok(())
}

pub fn list_overrides(
    conn: &Connection,
    from: Option<NaiveDate>,
) -> anyhow::Result<Vec<ScheduleOverride>> {
    let mut stmt;
    let rows = match from {
        Some(from) => {
            stmt = conn.prepare(
                "SELECT date, is_closed, open_time, close_time, max_bookings_per_slot, reason
                 FROM schedule_overrides WHERE date >= ?1 ORDER BY date ASC",
            )?;
            stmt.query_map(params![from.format(DATE_FMT).to_string()], |row| {
                Ok(parse_override_row(row))
            })?
            .collect::<Vec<_>>()
        }
        None => {
            stmt = conn.prepare(
                "SELECT date, is_closed, open_time, close_time, max_bookings_per_slot, reason
                 FROM schedule_overrides ORDER BY date ASC",
            )?;
            stmt.query_map([], |row| Ok(parse_override_row(row)))?
                .collect::<Vec<_>>()
        }
    };

    let mut overrides = vec![];
    for row in rows {
        overrides.push(row??);
    }
    Ok(overrides)
}

pub fn delete_override(conn: &Connection, date: NaiveDate) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM schedule_overrides WHERE date = ?1",
        params![date.format(DATE_FMT).to_string()],
    )?;
    Ok(count > 0)
}

fn parse_override_row(row: &rusqlite::Row) -> anyhow::Result<ScheduleOverride> {
    let date: String = row.get(0)?;
    let is_closed: bool = row.get::<_, i32>(1)? != 0;
    let open_time: Option<String> = row.get(2)?;
    let close_time: Option<String> = row.get(3)?;
    let max_bookings_per_slot: Option<i64> = row.get(4)?;
    let reason: Option<String> = row.get(5)?;

    Ok(ScheduleOverride {
        date: NaiveDate::parse_from_str(&date, DATE_FMT)
            .map_err(|_| anyhow::anyhow!("invalid stored date: {date}"))?,
        is_closed,
        open_time: open_time.as_deref().map(parse_stored_time).transpose()?,
        close_time: close_time.as_deref().map(parse_stored_time).transpose()?,
        max_bookings_per_slot,
        reason,
    })
}

// ── Bookings ──

/// Atomic admission: count the slot's live occupancy and insert only while
/// still under capacity, inside one transaction. Returns false when the
/// slot is already full.
pub fn admit_booking(
    conn: &mut Connection,
    booking: &Booking,
    max_per_slot: i64,
) -> anyhow::Result<bool> {
    let date = booking.booking_date.format(DATE_FMT).to_string();
    let time = booking.booking_time.storage();

    let tx = conn.transaction()?;

    let occupied: i64 = tx.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE booking_date = ?1 AND booking_time = ?2 AND status IN ('pending', 'confirmed')",
        params![date, time],
        |row| row.get(0),
    )?;

    if occupied >= max_per_slot {
        return Ok(false);
    }

    tx.execute(
        "INSERT INTO bookings (id, customer_name, customer_email, customer_phone, services, booking_date, booking_time, status, notes, total_price, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            booking.id,
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            serde_json::to_string(&booking.services)?,
            date,
            time,
            booking.status.as_str(),
            booking.notes,
            booking.total_price,
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;

    tx.commit()?;
    Ok(true)
}

/// Live occupancy per slot for one date, keyed by the stored "HH:MM" time.
/// Only pending and confirmed bookings consume capacity.
pub fn booking_counts_for_date(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT booking_time, COUNT(*) FROM bookings
         WHERE booking_date = ?1 AND status IN ('pending', 'confirmed')
         GROUP BY booking_time",
    )?;
    let rows = stmt.query_map(params![date.format(DATE_FMT).to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (time, count) = row?;
        counts.insert(time, count);
    }
    Ok(counts)
}

pub fn count_pending_for_phone(conn: &Connection, phone: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE customer_phone = ?1 AND status = 'pending'",
        params![phone],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, customer_name, customer_email, customer_phone, services, booking_date, booking_time, status, notes, total_price, created_at, updated_at \
             FROM bookings WHERE status = ?1 ORDER BY booking_date DESC, booking_time DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            "SELECT id, customer_name, customer_email, customer_phone, services, booking_date, booking_time, status, notes, total_price, created_at, updated_at \
             FROM bookings ORDER BY booking_date DESC, booking_time DESC LIMIT ?1"
                .to_string(),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, customer_name, customer_email, customer_phone, services, booking_date, booking_time, status, notes, total_price, created_at, updated_at \
         FROM bookings WHERE id = ?1",
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let customer_name: String = row.get(1)?;
    let customer_email: Option<String> = row.get(2)?;
    let customer_phone: String = row.get(3)?;
    let services_json: String = row.get(4)?;
    let booking_date: String = row.get(5)?;
    let booking_time: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let notes: Option<String> = row.get(8)?;
    let total_price: f64 = row.get(9)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    Ok(Booking {
        id,
        customer_name,
        customer_email,
        customer_phone,
        services: serde_json::from_str(&services_json).unwrap_or_default(),
        booking_date: NaiveDate::parse_from_str(&booking_date, DATE_FMT)
            .map_err(|_| anyhow::anyhow!("invalid stored booking date: {booking_date}"))?,
        booking_time: SlotTime::parse(&booking_time)?,
        status: BookingStatus::parse(&status_str).unwrap_or(BookingStatus::Pending),
        notes,
        total_price,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        updated_at: NaiveDateTime::parse_from_str(&updated_at_str, DATETIME_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::ServiceItem;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn make_booking(phone: &str, date: &str, time: &str, status: BookingStatus) -> Booking {
        let now = Utc::now().naive_utc();
        Booking {
            id: uuid::Uuid::new_v4().to_string(),
            customer_name: "Alice".to_string(),
            customer_email: None,
            customer_phone: phone.to_string(),
            services: vec![ServiceItem {
                id: "haircut".to_string(),
                name: "Haircut".to_string(),
                price: 350.0,
                duration: "60 mins".to_string(),
            }],
            booking_date: NaiveDate::parse_from_str(date, DATE_FMT).unwrap(),
            booking_time: SlotTime::parse(time).unwrap(),
            status,
            notes: None,
            total_price: 350.0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_template_synthesizes_defaults() {
        let conn = setup_db();
        let template = get_template(&conn).unwrap();
        assert_eq!(template.len(), 7);
        assert!(!template[0].is_open); // Sunday
        assert!(template[1].is_open);
    }

    #[test]
    fn test_put_template_round_trip() {
        let mut conn = setup_db();
        let mut rows: Vec<DaySchedule> = (0..7).map(DaySchedule::default_for).collect();
        rows[2].is_open = false;
        rows[3].slot_duration_minutes = 30;
        rows[3].break_start = None;
        rows[3].break_end = None;

        put_template(&mut conn, &rows).unwrap();

        let stored = get_template(&conn).unwrap();
        assert!(!stored[2].is_open);
        assert_eq!(stored[3].slot_duration_minutes, 30);
        assert_eq!(stored[3].break_start, None);

        // Second replace overwrites, never duplicates.
        put_template(&mut conn, &rows).unwrap();
        assert_eq!(get_template(&conn).unwrap().len(), 7);
    }

    #[test]
    fn test_override_upsert_is_unique_per_date() {
        let conn = setup_db();
        let date = NaiveDate::from_ymd_opt(2030, 12, 25).unwrap();

        upsert_override(
            &conn,
            &ScheduleOverride {
                date,
                is_closed: true,
                open_time: None,
                close_time: None,
                max_bookings_per_slot: None,
                reason: Some("Christmas".to_string()),
            },
        )
        .unwrap();
        upsert_override(
            &conn,
            &ScheduleOverride {
                date,
                is_closed: false,
                open_time: NaiveTime::from_hms_opt(10, 0, 0),
                close_time: NaiveTime::from_hms_opt(14, 0, 0),
                max_bookings_per_slot: Some(2),
                reason: Some("Half day".to_string()),
            },
        )
        .unwrap();

        let all = list_overrides(&conn, None).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_closed);
        assert_eq!(all[0].reason.as_deref(), Some("Half day"));

        assert!(delete_override(&conn, date).unwrap());
        assert!(!delete_override(&conn, date).unwrap());
    }

    #[test]
    fn test_list_overrides_from_date() {
        let conn = setup_db();
        for (y, m, d) in [(2030, 1, 1), (2030, 6, 1), (2030, 12, 25)] {
            upsert_override(
                &conn,
                &ScheduleOverride {
                    date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                    is_closed: true,
                    open_time: None,
                    close_time: None,
                    max_bookings_per_slot: None,
                    reason: None,
                },
            )
            .unwrap();
        }

        let from = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        let upcoming = list_overrides(&conn, Some(from)).unwrap();
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].date, from);
    }

    #[test]
    fn test_admit_booking_enforces_capacity() {
        let mut conn = setup_db();
        let first = make_booking("09171234567", "2030-06-17", "10:00", BookingStatus::Pending);
        let second = make_booking("09179876543", "2030-06-17", "10:00", BookingStatus::Pending);

        assert!(admit_booking(&mut conn, &first, 1).unwrap());
        assert!(!admit_booking(&mut conn, &second, 1).unwrap());

        // Rejected attempt left nothing behind.
        let counts = booking_counts_for_date(
            &conn,
            NaiveDate::from_ymd_opt(2030, 6, 17).unwrap(),
        )
        .unwrap();
        assert_eq!(counts.get("10:00"), Some(&1));
    }

    #[test]
    fn test_cancelled_bookings_free_capacity() {
        let mut conn = setup_db();
        let booking = make_booking("09171234567", "2030-06-17", "10:00", BookingStatus::Pending);
        assert!(admit_booking(&mut conn, &booking, 1).unwrap());

        update_booking_status(&conn, &booking.id, BookingStatus::Cancelled).unwrap();

        let retry = make_booking("09179876543", "2030-06-17", "10:00", BookingStatus::Pending);
        assert!(admit_booking(&mut conn, &retry, 1).unwrap());
    }

    #[test]
    fn test_count_pending_for_phone_ignores_other_statuses() {
        let mut conn = setup_db();
        let phone = "09171234567";
        let a = make_booking(phone, "2030-06-17", "09:00", BookingStatus::Pending);
        let b = make_booking(phone, "2030-06-17", "10:00", BookingStatus::Pending);
        admit_booking(&mut conn, &a, 5).unwrap();
        admit_booking(&mut conn, &b, 5).unwrap();
        assert_eq!(count_pending_for_phone(&conn, phone).unwrap(), 2);

        update_booking_status(&conn, &a.id, BookingStatus::Confirmed).unwrap();
        assert_eq!(count_pending_for_phone(&conn, phone).unwrap(), 1);
    }

    #[test]
    fn test_booking_round_trip() {
        let mut conn = setup_db();
        let booking = make_booking("09171234567", "2030-06-17", "13:30", BookingStatus::Pending);
        admit_booking(&mut conn, &booking, 1).unwrap();

        let loaded = get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(loaded.customer_phone, booking.customer_phone);
        assert_eq!(loaded.booking_time, booking.booking_time);
        assert_eq!(loaded.services.len(), 1);
        assert_eq!(loaded.services[0].name, "Haircut");
        assert_eq!(loaded.status, BookingStatus::Pending);

        assert!(delete_booking(&conn, &booking.id).unwrap());
        assert!(get_booking_by_id(&conn, &booking.id).unwrap().is_none());
    }

    #[test]
    fn test_get_all_bookings_status_filter() {
        let mut conn = setup_db();
        let a = make_booking("09171234567", "2030-06-17", "09:00", BookingStatus::Pending);
        let b = make_booking("09179876543", "2030-06-17", "10:00", BookingStatus::Pending);
        admit_booking(&mut conn, &a, 5).unwrap();
        admit_booking(&mut conn, &b, 5).unwrap();
        update_booking_status(&conn, &b.id, BookingStatus::Confirmed).unwrap();

        assert_eq!(get_all_bookings(&conn, None, 50).unwrap().len(), 2);
        let confirmed = get_all_bookings(&conn, Some("confirmed"), 50).unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, b.id);
    }
}
