use std::time::Duration;

use env_flags::env_flags;

env_flags! {
    /// Origin of the portfolio backend, without a trailing slash.
    pub FOLIO_API_BASE: &str = "http://127.0.0.1:8080";

    pub FOLIO_REQUEST_MAX_RETRIES: u64 = 3;

    /// The answer stream settles as failed when no event at all arrives
    /// within this window.
    pub FOLIO_STREAM_IDLE_TIMEOUT_MS: Duration = Duration::from_millis(30_000), |value| {
        value.parse().map(Duration::from_millis)
    };

    /// Budget for the auxiliary metadata endpoints (remaining count,
    /// history, clear).
    pub FOLIO_METADATA_TIMEOUT_MS: Duration = Duration::from_millis(60_000), |value| {
        value.parse().map(Duration::from_millis)
    };
}

/// Effective retry budget for outbound requests.
///
/// `env_flags!` caches lazily for the life of the process; tests tweak the
/// variable at runtime, so re-read it here and fall back to the cached
/// default when unset or invalid.
#[inline]
pub fn request_max_retries() -> u64 {
    match std::env::var("FOLIO_REQUEST_MAX_RETRIES") {
        Ok(s) => s.parse::<u64>().unwrap_or(*FOLIO_REQUEST_MAX_RETRIES),
        Err(_) => *FOLIO_REQUEST_MAX_RETRIES,
    }
}
