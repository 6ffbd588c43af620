use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;
use strum_macros::EnumString;
use ts_rs::TS;

use crate::message_id::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// Rendering kind of a structured payload. `Text` is plain prose; the other
/// kinds select a dedicated component in the front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ContentFormat {
    #[default]
    Text,
    Table,
    Contact,
    Pdf,
}

/// Message body carrying a format kind plus an optional typed payload.
///
/// Invariant after settle: `format != Text` implies `data` is `Some`, either
/// the repaired payload or an `{"error": ...}` placeholder, never `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct StructuredContent {
    pub text: String,
    pub format: ContentFormat,
    pub data: Option<Value>,
}

/// A message body is either plain prose or structured content. The wire shape
/// is untagged: a JSON string stays a string, everything else is the
/// structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
pub enum MessageContent {
    Plain(String),
    Structured(StructuredContent),
}

impl MessageContent {
    /// The human-readable text of the body, whatever its shape.
    pub fn text(&self) -> &str {
        match self {
            MessageContent::Plain(text) => text,
            MessageContent::Structured(content) => &content.text,
        }
    }

    pub fn format(&self) -> ContentFormat {
        match self {
            MessageContent::Plain(_) => ContentFormat::Text,
            MessageContent::Structured(content) => content.format,
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Plain(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    pub is_streaming: bool,
    pub is_error: bool,
    pub parse_error: Option<String>,
}

impl Message {
    /// A settled user message, timestamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender: Sender::User,
            content: MessageContent::Plain(content.into()),
            timestamp: Utc::now(),
            is_streaming: false,
            is_error: false,
            parse_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn content_format_parses_case_insensitively() {
        assert_eq!("CONTACT".parse::<ContentFormat>(), Ok(ContentFormat::Contact));
        assert_eq!("pdf".parse::<ContentFormat>(), Ok(ContentFormat::Pdf));
        assert!("card".parse::<ContentFormat>().is_err());
    }

    #[test]
    fn message_content_is_untagged_on_the_wire() {
        let plain: MessageContent = serde_json::from_str("\"hi\"").expect("plain");
        assert_eq!(plain, MessageContent::Plain("hi".to_string()));

        let structured: MessageContent =
            serde_json::from_str(r#"{"text":"hi","format":"table","data":{"rows":[]}}"#)
                .expect("structured");
        assert_eq!(structured.format(), ContentFormat::Table);
    }

    #[test]
    fn message_serializes_camel_case() {
        let message = Message::user("hello");
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["sender"], "user");
        assert!(value.get("isStreaming").is_some());
        assert!(value.get("parseError").is_some());
    }
}
