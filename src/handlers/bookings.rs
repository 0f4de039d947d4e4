use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::services::admission::{self, BookingRequest};
use crate::state::AppState;

/// Client address for quota purposes: first X-Forwarded-For entry, then
/// X-Real-IP, then "unknown". Trust in these headers is a deployment
/// concern (reverse proxy strips inbound values).
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    "unknown".to_string()
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BookingRequest>,
) -> Response {
    let ip = client_ip(&headers);

    match admission::submit(
        &state.db,
        state.booking_quota.as_ref(),
        state.bot_verifier.as_deref(),
        &ip,
        &req,
    )
    .await
    {
        Ok(outcome) => {
            let body = serde_json::json!({
                "success": true,
                "booking": {
                    "id": outcome.booking.id,
                    "status": outcome.booking.status.as_str(),
                    "createdAt": outcome.booking.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                },
                "remaining": outcome.remaining,
            });
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(err) => {
            let status = StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut body = serde_json::json!({
                "success": false,
                "error": err.to_string(),
            });
            if let Some(retry_after) = err.retry_after() {
                body["retryAfter"] = retry_after.into();
            }
            (status, Json(body)).into_response()
        }
    }
}
