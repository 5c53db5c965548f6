use chrono::Utc;
use tokio::time::Instant;

use crate::utils::constants::CREDENTIAL_SKEW_SECONDS;

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// Absolute expiry for an issuer response: explicit `expires_at` wins,
/// otherwise `now + expires_in`. `None` when the response carries neither.
pub fn expires_at_from(expires_at: Option<i64>, expires_in: Option<i64>) -> Option<i64> {
    expires_at.or(expires_in.map(|ttl| now_i64() + ttl))
}

/// A value expiring at `expires_at` is still usable when
/// `now + skew < expires_at`.
pub fn is_fresh_at(now: i64, expires_at: i64) -> bool {
    now + CREDENTIAL_SKEW_SECONDS < expires_at
}
