use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::rate_limit::QuotaStore;
use crate::services::verification::BotVerifier;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    /// None when no oracle secret is configured; admission then skips the
    /// bot-score check entirely.
    pub bot_verifier: Option<Box<dyn BotVerifier>>,
    pub booking_quota: Box<dyn QuotaStore>,
}
