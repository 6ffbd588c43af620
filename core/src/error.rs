use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FolioErr>;

/// Failure modes of the ingestion subsystem.
///
/// Only transport-level variants terminate a turn; directive and payload
/// problems are recovered inside the pipeline and surface as `parseError`
/// annotations on the message instead.
#[derive(Error, Debug)]
pub enum FolioErr {
    /// The event stream broke mid-turn (read error, malformed transport).
    #[error("stream disconnected: {0}")]
    Stream(String),

    /// No event arrived within the idle window, or a metadata fetch ran past
    /// its budget.
    #[error("timed out waiting for the backend")]
    Timeout,

    /// The in-flight turn was cancelled before the stream settled.
    #[error("turn interrupted")]
    Interrupted,

    /// A second submit while a turn is still streaming. The UI disables
    /// input during a turn, so hitting this means a driver bug.
    #[error("a turn is already in flight for this conversation")]
    TurnInFlight,

    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(StatusCode, String),

    #[error("exceeded retry limit, last status: {0}")]
    RetryLimit(StatusCode),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
