use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;
use strum_macros::EnumString;
use ts_rs::TS;

use crate::message::Sender;

/// Answer style requested from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ResponseStyle {
    #[default]
    Normal,
    Formal,
    Explanatory,
    Minimalist,
    Hr,
}

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChatRequest {
    pub message: String,
    pub style: ResponseStyle,
}

/// Body of `GET /api/remaining`. The count is an opaque integer owned by the
/// server; this side only displays it.
#[derive(Debug, Clone, Copy, Deserialize, TS)]
pub struct RemainingResponse {
    pub remaining: i64,
}

/// One persisted message from `GET /api/conversation/history`. The content
/// field is whatever the server stored (string, structured object, or
/// something unexpected), so it stays raw JSON until the ingestion side
/// coerces it.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct HistoryMessage {
    pub id: String,
    pub sender: Sender,
    pub content: Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryMessage>,
}

/// One framed record of the answer stream: the optional `event:` name and the
/// `data:` payload. Heartbeat comment lines never surface as records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// Event name used for answer fragments. Records with no explicit
    /// `event:` line are treated as fragments too.
    pub const MESSAGE: &'static str = "message";
    /// Event name closing a turn; its payload is `{"done": true}`.
    pub const DONE: &'static str = "done";
}
