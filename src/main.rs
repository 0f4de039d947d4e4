use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use salonbook::config::AppConfig;
use salonbook::db;
use salonbook::handlers;
use salonbook::services::admission::{MAX_BOOKINGS_PER_IP, RATE_LIMIT_WINDOW_SECS};
use salonbook::services::rate_limit::FixedWindowLimiter;
use salonbook::services::verification::recaptcha::RecaptchaVerifier;
use salonbook::services::verification::BotVerifier;
use salonbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let bot_verifier: Option<Box<dyn BotVerifier>> = if config.recaptcha_secret_key.is_empty() {
        tracing::warn!("RECAPTCHA_SECRET_KEY not configured, bot-score verification disabled");
        None
    } else {
        tracing::info!("bot-score verification enabled");
        Some(Box::new(RecaptchaVerifier::new(
            config.recaptcha_secret_key.clone(),
        )))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        bot_verifier,
        booking_quota: Box::new(FixedWindowLimiter::new(
            MAX_BOOKINGS_PER_IP,
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        )),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/schedule",
            get(handlers::schedule::get_schedule).put(handlers::schedule::put_schedule),
        )
        .route(
            "/api/schedule/overrides",
            get(handlers::schedule::get_overrides)
                .post(handlers::schedule::upsert_override)
                .delete(handlers::schedule::delete_override),
        )
        .route(
            "/api/bookings",
            post(handlers::bookings::create_booking).get(handlers::admin::get_bookings),
        )
        .route(
            "/api/bookings/:id/status",
            post(handlers::admin::update_booking_status),
        )
        .route("/api/bookings/:id", delete(handlers::admin::delete_booking))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
