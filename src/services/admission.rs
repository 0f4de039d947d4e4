use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, ServiceItem, SlotTime};
use crate::services::rate_limit::QuotaStore;
use crate::services::schedule::{self, DayResolution};
use crate::services::slots;
use crate::services::verification::BotVerifier;

pub const MAX_BOOKINGS_PER_IP: u32 = 3;
pub const RATE_LIMIT_WINDOW_SECS: u64 = 3600;
const MAX_PENDING_PER_PHONE: i64 = 2;
const MIN_BOT_SCORE: f64 = 0.5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub services: Vec<ServiceItem>,
    #[serde(default)]
    pub booking_date: String,
    #[serde(default)]
    pub booking_time: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub recaptcha_token: Option<String>,
    #[serde(default)]
    pub honeypot: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    // Deliberately worded like an ordinary failure so bots cannot tell
    // detection apart from rejection.
    #[error("Booking failed. Please try again.")]
    Honeypot,

    #[error("Missing required fields.")]
    MissingFields,

    #[error("Invalid phone number format.")]
    InvalidPhone,

    #[error("Invalid booking date.")]
    InvalidDate,

    #[error("Invalid booking time.")]
    InvalidTime,

    #[error("Security verification required.")]
    VerificationRequired,

    #[error("Security verification failed. Please refresh and try again.")]
    VerificationFailed,

    #[error("Too many booking attempts. Please try again in an hour.")]
    RateLimited,

    #[error("You already have {0} pending booking(s). Please wait for confirmation before booking again.")]
    PendingLimit(i64),

    #[error("We are closed on the selected date.")]
    DayClosed,

    #[error("That time is not a bookable slot.")]
    SlotNotOffered,

    #[error("That time slot is fully booked. Please pick a different time.")]
    SlotFull,

    #[error("Failed to create booking. Please try again.")]
    Storage(#[source] anyhow::Error),
}

impl AdmissionError {
    pub fn http_status(&self) -> u16 {
        match self {
            AdmissionError::RateLimited => 429,
            AdmissionError::Storage(_) => 500,
            _ => 400,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AdmissionError::RateLimited => Some(RATE_LIMIT_WINDOW_SECS),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct AdmissionOutcome {
    pub booking: Booking,
    /// IP-quota submissions left in the current window.
    pub remaining: u32,
}

/// Validate and admit one booking request. Checks run in a fixed order and
/// short-circuit on the first failure; the IP quota is charged when its
/// check passes, so a request rejected later has still consumed a slot of
/// quota (never refunded).
pub async fn submit(
    db: &Mutex<Connection>,
    quota: &dyn QuotaStore,
    verifier: Option<&dyn BotVerifier>,
    client_ip: &str,
    req: &BookingRequest,
) -> Result<AdmissionOutcome, AdmissionError> {
    // 1. Honeypot: a real form never fills the decoy field.
    if !req.honeypot.is_empty() {
        tracing::warn!(client_ip, "honeypot field filled, rejecting");
        return Err(AdmissionError::Honeypot);
    }

    // 2. Required fields.
    if req.customer_name.trim().is_empty()
        || req.customer_phone.is_empty()
        || req.services.is_empty()
        || req.booking_date.is_empty()
        || req.booking_time.is_empty()
    {
        return Err(AdmissionError::MissingFields);
    }

    // 3. Phone format: 11 digits starting "09".
    if !is_valid_phone(&req.customer_phone) {
        return Err(AdmissionError::InvalidPhone);
    }

    // 4. Bot-score verification. Fail closed: an unreachable oracle
    // rejects the request rather than waving it through.
    let token = req.recaptcha_token.as_deref().filter(|t| !t.is_empty());
    match (verifier, token) {
        (Some(verifier), Some(token)) => {
            let score = verifier.verify(token).await.map_err(|e| {
                tracing::error!(error = %e, "bot-score verification unavailable");
                AdmissionError::VerificationFailed
            })?;
            if !score.success || score.score < MIN_BOT_SCORE {
                tracing::warn!(client_ip, score = score.score, "bot-score check failed");
                return Err(AdmissionError::VerificationFailed);
            }
        }
        (Some(_), None) => return Err(AdmissionError::VerificationRequired),
        (None, _) => {}
    }

    // 5. Per-IP quota, charged here regardless of what later checks decide.
    let decision = quota.hit(client_ip);
    if !decision.allowed {
        tracing::warn!(client_ip, "booking quota exhausted");
        return Err(AdmissionError::RateLimited);
    }

    let booking_date = NaiveDate::parse_from_str(&req.booking_date, "%Y-%m-%d")
        .map_err(|_| AdmissionError::InvalidDate)?;
    let booking_time =
        SlotTime::parse(&req.booking_time).map_err(|_| AdmissionError::InvalidTime)?;

    // 6. Per-phone pending cap.
    let pending = {
        let conn = db.lock().unwrap();
        queries::count_pending_for_phone(&conn, &req.customer_phone)
            .map_err(AdmissionError::Storage)?
    };
    if pending >= MAX_PENDING_PER_PHONE {
        return Err(AdmissionError::PendingLimit(pending));
    }

    // 7. Commit: resolve the day and test capacity atomically with the
    // insert, under the same connection lock.
    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_name: req.customer_name.trim().to_string(),
        customer_email: Some(req.customer_email.clone()).filter(|e| !e.is_empty()),
        customer_phone: req.customer_phone.clone(),
        services: req.services.clone(),
        booking_date,
        booking_time,
        status: BookingStatus::Pending,
        notes: req.notes.clone().filter(|n| !n.is_empty()),
        total_price: req.total_price,
        created_at: now,
        updated_at: now,
    };

    {
        let mut conn = db.lock().unwrap();

        let day = match schedule::resolve_day(&conn, booking_date)
            .map_err(AdmissionError::Storage)?
        {
            DayResolution::Closed { .. } => return Err(AdmissionError::DayClosed),
            DayResolution::Open(day) => day,
        };

        let grid = slots::generate_slots(
            day.open_time,
            day.close_time,
            day.slot_duration_minutes,
            day.break_window,
        );
        if !grid.contains(&booking_time) {
            return Err(AdmissionError::SlotNotOffered);
        }

        let admitted = queries::admit_booking(&mut conn, &booking, day.max_bookings_per_slot)
            .map_err(AdmissionError::Storage)?;
        if !admitted {
            return Err(AdmissionError::SlotFull);
        }
    }

    tracing::info!(
        booking_id = %booking.id,
        date = %booking.booking_date,
        time = %booking.booking_time,
        "booking admitted"
    );

    Ok(AdmissionOutcome {
        booking,
        remaining: decision.remaining,
    })
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 11 && phone.starts_with("09") && phone.bytes().all(|b| b.is_ascii_digit())
}
