use std::time::Duration;

use folio_protocol::ResponseStyle;

use crate::flags::FOLIO_API_BASE;
use crate::flags::FOLIO_METADATA_TIMEOUT_MS;
use crate::flags::FOLIO_STREAM_IDLE_TIMEOUT_MS;
use crate::flags::request_max_retries;

/// Settings for one conversation's backend connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin, no trailing slash.
    pub base_url: String,

    /// Answer style sent with every chat request.
    pub style: ResponseStyle,

    /// Per-await idle budget while the answer stream is open.
    pub stream_idle_timeout: Duration,

    /// Budget for auxiliary metadata fetches.
    pub metadata_timeout: Duration,

    /// How many times a request is retried on 429/5xx before giving up.
    pub request_max_retries: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: FOLIO_API_BASE.trim_end_matches('/').to_string(),
            style: ResponseStyle::default(),
            stream_idle_timeout: *FOLIO_STREAM_IDLE_TIMEOUT_MS,
            metadata_timeout: *FOLIO_METADATA_TIMEOUT_MS,
            request_max_retries: request_max_retries(),
        }
    }
}

impl Config {
    /// Default config pointed at a different backend origin.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            ..Self::default()
        }
    }
}
