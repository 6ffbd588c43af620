//! Transcript of settled and in-flight messages for one conversation.

use chrono::DateTime;
use chrono::Utc;
use folio_protocol::HistoryMessage;
use folio_protocol::Message;
use folio_protocol::MessageContent;
use folio_protocol::MessageId;
use folio_protocol::StructuredContent;
use serde_json::Value;
use tracing::debug;

/// Oldest-first list of messages. Settled messages are immutable; the one
/// in-flight message is only ever updated by replacing it wholesale with a
/// fresh snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Rebuild a transcript from the backend's persisted history.
    pub fn from_backend(records: Vec<HistoryMessage>) -> Self {
        let messages = records.into_iter().map(coerce_record).collect();
        Self { messages }
    }

    /// Clone of the transcript for rendering.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_streaming(&self) -> bool {
        self.messages.iter().any(|m| m.is_streaming)
    }

    /// Append a message. At most one streaming message may exist at a time.
    pub fn record(&mut self, message: Message) {
        debug_assert!(
            !(message.is_streaming && self.has_streaming()),
            "a second streaming message was recorded"
        );
        self.messages.push(message);
    }

    /// Replace the message with the same id wholesale; appends when the id
    /// is unknown.
    pub fn replace(&mut self, message: Message) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => *slot = message,
            None => {
                debug!("replace for unknown message id {}, appending", message.id);
                self.messages.push(message);
            }
        }
    }
}

/// Coerce one persisted record into a settled message. Content that is
/// neither a string nor a structured object is stringified rather than
/// rejected.
fn coerce_record(record: HistoryMessage) -> Message {
    let content = match record.content {
        Value::String(text) => MessageContent::Plain(text),
        value @ Value::Object(_) => match serde_json::from_value::<StructuredContent>(value.clone())
        {
            Ok(structured) => MessageContent::Structured(structured),
            Err(_) => MessageContent::Plain(value.to_string()),
        },
        other => MessageContent::Plain(other.to_string()),
    };

    Message {
        id: MessageId::from_string(&record.id).unwrap_or_default(),
        sender: record.sender,
        content,
        timestamp: DateTime::parse_from_rfc3339(&record.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        is_streaming: false,
        is_error: false,
        parse_error: None,
    }
}
