use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of charging one request against a key's quota.
#[derive(Debug, Clone, Copy)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Per-key request quota. Implementations are process-local here; the seam
/// exists so a shared counter store can back it in a multi-instance
/// deployment.
pub trait QuotaStore: Send + Sync {
    fn hit(&self, key: &str) -> QuotaDecision;
}

struct RateLimitRecord {
    count: u32,
    window_reset_at: Instant,
}

/// Fixed-window counter: the window resets to now + `window` on the first
/// hit after expiry, and the count climbs per request up to `max_hits`.
/// State lives in memory only and is lost on restart; acceptable for a
/// single-instance deployment.
pub struct FixedWindowLimiter {
    max_hits: u32,
    window: Duration,
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl FixedWindowLimiter {
    pub fn new(max_hits: u32, window: Duration) -> Self {
        FixedWindowLimiter {
            max_hits,
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn hit_at(&self, key: &str, now: Instant) -> QuotaDecision {
        let mut records = self.records.lock().unwrap();

        // Expired windows behave exactly like absent ones; dropping them
        // here also keeps the map from growing without bound.
        records.retain(|_, record| now < record.window_reset_at);

        match records.get_mut(key) {
            Some(record) => {
                if record.count >= self.max_hits {
                    return QuotaDecision {
                        allowed: false,
                        remaining: 0,
                    };
                }
                record.count += 1;
                QuotaDecision {
                    allowed: true,
                    remaining: self.max_hits - record.count,
                }
            }
            None => {
                records.insert(
                    key.to_string(),
                    RateLimitRecord {
                        count: 1,
                        window_reset_at: now + self.window,
                    },
                );
                QuotaDecision {
                    allowed: true,
                    remaining: self.max_hits - 1,
                }
            }
        }
    }
}

impl QuotaStore for FixedWindowLimiter {
    fn hit(&self, key: &str) -> QuotaDecision {
        self.hit_at(key, Instant::now())
    }
}
