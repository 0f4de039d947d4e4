use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::admin::check_auth;
use crate::models::schedule::time_serde;
use crate::models::{DaySchedule, ScheduleOverride};
use crate::services::availability;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<String>,
}

// GET /api/schedule            -> template + upcoming overrides
// GET /api/schedule?date=...   -> bookable slots for that date
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Response, AppError> {
    match query.date {
        Some(date_str) => {
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .map_err(|_| AppError::Validation("Invalid date format".to_string()))?;

            let now = Local::now().naive_local();
            let day = {
                let db = state.db.lock().unwrap();
                availability::get_availability(&db, date, now)?
            };
            Ok(Json(day).into_response())
        }
        None => {
            let today = Local::now().date_naive();
            let (settings, overrides) = {
                let db = state.db.lock().unwrap();
                (
                    queries::get_template(&db)?,
                    queries::list_overrides(&db, Some(today))?,
                )
            };
            Ok(Json(serde_json::json!({
                "settings": settings,
                "overrides": overrides,
            }))
            .into_response())
        }
    }
}

// PUT /api/schedule
#[derive(Deserialize)]
pub struct PutScheduleBody {
    pub settings: Vec<DaySchedule>,
}

pub async fn put_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PutScheduleBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut days_seen: Vec<u8> = body.settings.iter().map(|d| d.day_of_week).collect();
    days_seen.sort_unstable();
    if days_seen != (0..7).collect::<Vec<u8>>() {
        return Err(AppError::Validation(
            "Settings must cover each weekday exactly once.".to_string(),
        ));
    }
    for day in &body.settings {
        day.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    {
        let mut db = state.db.lock().unwrap();
        queries::put_template(&mut db, &body.settings)?;
    }

    tracing::info!("weekly schedule template replaced");
    Ok(Json(serde_json::json!({ "success": true })))
}

// GET /api/schedule/overrides
pub async fn get_overrides(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let overrides = {
        let db = state.db.lock().unwrap();
        queries::list_overrides(&db, None)?
    };
    Ok(Json(serde_json::json!({ "overrides": overrides })))
}

// POST /api/schedule/overrides
#[derive(Deserialize)]
pub struct OverrideBody {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default, with = "time_serde::hms_opt")]
    pub open_time: Option<NaiveTime>,
    #[serde(default, with = "time_serde::hms_opt")]
    pub close_time: Option<NaiveTime>,
    #[serde(default)]
    pub max_bookings_per_slot: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn upsert_override(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<OverrideBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = body
        .date
        .ok_or_else(|| AppError::Validation("Date is required".to_string()))?;

    let override_ = ScheduleOverride {
        date,
        is_closed: body.is_closed,
        open_time: body.open_time,
        close_time: body.close_time,
        // Zero or negative capacity means "no override", same as absent.
        max_bookings_per_slot: body.max_bookings_per_slot.filter(|v| *v > 0),
        reason: body.reason.filter(|r| !r.is_empty()),
    };

    let stored = {
        let db = state.db.lock().unwrap();
        queries::upsert_override(&db, &override_)?;
        queries::get_override(&db, date)?
    };

    tracing::info!(date = %date, is_closed = override_.is_closed, "schedule override upserted");
    Ok(Json(serde_json::json!({
        "success": true,
        "override": stored,
    })))
}

// DELETE /api/schedule/overrides?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct DeleteOverrideQuery {
    pub date: Option<String>,
}

pub async fn delete_override(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DeleteOverrideQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date_str = query
        .date
        .ok_or_else(|| AppError::Validation("Date is required".to_string()))?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Invalid date format".to_string()))?;

    {
        let db = state.db.lock().unwrap();
        queries::delete_override(&db, date)?;
    }

    Ok(Json(serde_json::json!({ "success": true })))
}
