//! Per-message state machine driving one AI turn.
//!
//! States run `pending → streaming → {complete, error}`; the two settled
//! states are terminal. The lifecycle exclusively owns the accumulation
//! buffer; the rendering layer only ever receives the immutable [`Message`]
//! snapshots returned by each transition.

use chrono::DateTime;
use chrono::Utc;
use folio_protocol::ContentFormat;
use folio_protocol::Message;
use folio_protocol::MessageContent;
use folio_protocol::MessageId;
use folio_protocol::Sender;
use folio_protocol::StructuredContent;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::contact;
use crate::dedup::dedup_stream_text;
use crate::directive::extract_directives;
use crate::error::FolioErr;
use crate::repair::RepairOutcome;
use crate::repair::repair_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    Streaming,
    Complete,
    Error,
}

impl LifecycleState {
    pub fn is_settled(self) -> bool {
        matches!(self, LifecycleState::Complete | LifecycleState::Error)
    }
}

pub struct MessageLifecycle {
    id: MessageId,
    created_at: DateTime<Utc>,
    state: LifecycleState,
    /// Cumulative deduplicated answer text, directives still inline.
    buffer: String,
    /// One-way: once contact phrasing is seen, the message renders as a
    /// contact card for the rest of its life.
    contact_latched: bool,
    content: MessageContent,
    parse_error: Option<String>,
}

impl MessageLifecycle {
    pub fn new() -> Self {
        Self {
            id: MessageId::new(),
            created_at: Utc::now(),
            state: LifecycleState::Pending,
            buffer: String::new(),
            contact_latched: false,
            content: MessageContent::Plain(String::new()),
            parse_error: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The empty streaming placeholder published to the conversation the
    /// moment the user submits, so the UI has something to render.
    pub fn placeholder(&self) -> Message {
        self.snapshot()
    }

    /// Ingest one `message` event payload and return the fresh snapshot.
    pub fn apply_chunk(&mut self, payload: &str) -> Message {
        if self.state.is_settled() {
            debug!("chunk after settle ignored");
            return self.snapshot();
        }
        self.state = LifecycleState::Streaming;

        let fragment = unescape_stream_text(payload);
        self.buffer.push_str(&fragment);
        self.buffer = dedup_stream_text(&self.buffer);

        if !self.contact_latched
            && (contact::mentions_contact(&fragment) || contact::mentions_contact(&self.buffer))
        {
            debug!("contact phrasing detected, latching contact format");
            self.contact_latched = true;
        }

        self.reprocess();
        self.snapshot()
    }

    /// Derive the published content from the current buffer.
    fn reprocess(&mut self) {
        let extraction = extract_directives(&self.buffer);
        let mut format = extraction.format.unwrap_or_default();
        let mut data = None;
        self.parse_error = None;

        if let Some(raw) = extraction.data_raw {
            match repair_json(&raw) {
                RepairOutcome::Parsed(value) => data = Some(value),
                RepairOutcome::ContactFallback(value) => data = Some(value),
                RepairOutcome::Failed {
                    placeholder,
                    message,
                } => {
                    data = Some(placeholder);
                    self.parse_error = Some(message);
                }
            }
        }

        if self.contact_latched {
            format = ContentFormat::Contact;
            if data.is_none() {
                data = Some(contact::default_contact_payload());
            }
        }

        self.content = if format == ContentFormat::Text && data.is_none() {
            MessageContent::Plain(extraction.text)
        } else {
            MessageContent::Structured(StructuredContent {
                text: extraction.text,
                format,
                data,
            })
        };
    }

    /// Settle on a valid `done` event or normal stream end. Content is
    /// frozen as-is apart from enforcing the settled-data invariant.
    pub fn complete(&mut self) -> Message {
        if self.state.is_settled() {
            return self.snapshot();
        }
        self.state = LifecycleState::Complete;

        if let MessageContent::Structured(content) = &mut self.content {
            if content.format != ContentFormat::Text && content.data.is_none() {
                // A non-text format may never settle with a null payload.
                if content.format == ContentFormat::Contact {
                    content.data = Some(contact::default_contact_payload());
                } else {
                    let message = "structured payload never arrived".to_string();
                    content.data = Some(json!({ "error": message.clone() }));
                    self.parse_error = Some(message);
                }
            }
        }
        self.snapshot()
    }

    /// Settle a transport failure: partial content is discarded and replaced
    /// with cause-specific copy.
    pub fn fail(&mut self, err: &FolioErr) -> Message {
        if self.state.is_settled() {
            return self.snapshot();
        }
        debug!("turn failed: {err}");
        self.state = LifecycleState::Error;
        self.buffer.clear();
        self.parse_error = None;
        self.content = MessageContent::Plain(error_copy(err).to_string());
        self.snapshot()
    }

    /// User-triggered stop: settle as complete, keeping whatever partial
    /// content has already been published.
    pub fn interrupt(&mut self) -> Message {
        if self.state.is_settled() {
            return self.snapshot();
        }
        debug!("turn interrupted by user, keeping partial content");
        self.complete()
    }

    fn snapshot(&self) -> Message {
        Message {
            id: self.id,
            sender: Sender::Ai,
            content: self.content.clone(),
            timestamp: self.created_at,
            is_streaming: !self.state.is_settled(),
            is_error: self.state == LifecycleState::Error,
            parse_error: self.parse_error.clone(),
        }
    }
}

impl Default for MessageLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Undo the transport-level escaping of line breaks in `message` payloads.
fn unescape_stream_text(payload: &str) -> String {
    payload.replace("\\n", "\n").replace("\\r", "\r")
}

/// User-facing copy for a settled transport failure.
fn error_copy(err: &FolioErr) -> &'static str {
    const TIMEOUT_COPY: &str = "Sorry, the answer took too long to arrive. Please try again.";
    const UNAVAILABLE_COPY: &str =
        "The assistant is waking up. Please try again in a few seconds.";
    const GENERIC_COPY: &str = "Sorry, something went wrong while answering. Please try again.";

    match err {
        FolioErr::Timeout => TIMEOUT_COPY,
        FolioErr::UnexpectedStatus(status, _) | FolioErr::RetryLimit(status)
            if *status == StatusCode::SERVICE_UNAVAILABLE =>
        {
            UNAVAILABLE_COPY
        }
        _ => GENERIC_COPY,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn placeholder_is_empty_and_streaming() {
        let lifecycle = MessageLifecycle::new();
        let placeholder = lifecycle.placeholder();
        assert_eq!(placeholder.content.text(), "");
        assert!(placeholder.is_streaming);
        assert!(!placeholder.is_error);
        assert_eq!(lifecycle.state(), LifecycleState::Pending);
    }

    #[test]
    fn chunks_accumulate_and_unescape() {
        let mut lifecycle = MessageLifecycle::new();
        lifecycle.apply_chunk("line one\\n");
        let snapshot = lifecycle.apply_chunk("line two");
        assert_eq!(snapshot.content.text(), "line one\nline two");
        assert_eq!(lifecycle.state(), LifecycleState::Streaming);
    }

    #[test]
    fn done_before_any_message_settles_empty_text() {
        let mut lifecycle = MessageLifecycle::new();
        let settled = lifecycle.complete();
        assert_eq!(settled.content.text(), "");
        assert_eq!(settled.content.format(), ContentFormat::Text);
        assert!(!settled.is_streaming);
        assert!(!settled.is_error);
    }

    #[test]
    fn email_latch_is_one_way() {
        let mut lifecycle = MessageLifecycle::new();
        let first = lifecycle.apply_chunk("You can write to me. Email: hello@folio.dev");
        assert_eq!(first.content.format(), ContentFormat::Contact);

        // Later chunks carry no contact markers; the format must stick.
        let second = lifecycle.apply_chunk(" Anything else I can help with?");
        assert_eq!(second.content.format(), ContentFormat::Contact);
        match second.content {
            MessageContent::Structured(content) => {
                assert!(content.data.is_some());
            }
            MessageContent::Plain(_) => panic!("latched message must be structured"),
        }
    }

    #[test]
    fn directive_payload_becomes_structured_data() {
        let mut lifecycle = MessageLifecycle::new();
        let snapshot =
            lifecycle.apply_chunk("[format:table]Projects below[data:{rows: [[1, 2]]}][/format]");
        assert_eq!(snapshot.content.format(), ContentFormat::Table);
        assert_eq!(snapshot.content.text(), "Projects below");
        match snapshot.content {
            MessageContent::Structured(content) => {
                assert_eq!(
                    content.data,
                    Some(serde_json::json!({"rows": [[1, 2]]}))
                );
            }
            MessageContent::Plain(_) => panic!("expected structured content"),
        }
        assert_eq!(snapshot.parse_error, None);
    }

    #[test]
    fn unrepairable_payload_surfaces_parse_error() {
        let mut lifecycle = MessageLifecycle::new();
        let snapshot = lifecycle.apply_chunk("[format:table]x[data:<<garbage>>][/format]");
        assert!(snapshot.parse_error.is_some());
        match snapshot.content {
            MessageContent::Structured(content) => {
                let data = content.data.expect("placeholder data");
                assert!(data.get("error").is_some());
            }
            MessageContent::Plain(_) => panic!("expected structured content"),
        }
    }

    #[test]
    fn failure_discards_partial_content() {
        let mut lifecycle = MessageLifecycle::new();
        lifecycle.apply_chunk("partial answer that will be thrown away");
        let settled = lifecycle.fail(&FolioErr::Timeout);
        assert!(settled.is_error);
        assert!(!settled.is_streaming);
        assert_eq!(settled.content.format(), ContentFormat::Text);
        assert_eq!(
            settled.content.text(),
            "Sorry, the answer took too long to arrive. Please try again."
        );
    }

    #[test]
    fn unavailable_status_gets_its_own_copy() {
        let mut lifecycle = MessageLifecycle::new();
        let err = FolioErr::UnexpectedStatus(StatusCode::SERVICE_UNAVAILABLE, String::new());
        let settled = lifecycle.fail(&err);
        assert_eq!(
            settled.content.text(),
            "The assistant is waking up. Please try again in a few seconds."
        );
    }

    #[test]
    fn interrupt_keeps_partial_content() {
        let mut lifecycle = MessageLifecycle::new();
        lifecycle.apply_chunk("partial but useful");
        let settled = lifecycle.interrupt();
        assert!(!settled.is_error);
        assert!(!settled.is_streaming);
        assert_eq!(settled.content.text(), "partial but useful");
    }

    #[test]
    fn settled_message_is_frozen() {
        let mut lifecycle = MessageLifecycle::new();
        lifecycle.apply_chunk("the answer");
        let settled = lifecycle.complete();
        let after = lifecycle.apply_chunk("late chunk");
        assert_eq!(settled, after);
        assert_eq!(lifecycle.state(), LifecycleState::Complete);
    }

    #[test]
    fn format_without_payload_settles_with_placeholder() {
        let mut lifecycle = MessageLifecycle::new();
        lifecycle.apply_chunk("[format:pdf]resume");
        let settled = lifecycle.complete();
        match settled.content {
            MessageContent::Structured(content) => {
                assert_eq!(content.format, ContentFormat::Pdf);
                assert!(content.data.is_some());
            }
            MessageContent::Plain(_) => panic!("expected structured content"),
        }
        assert!(settled.parse_error.is_some());
    }
}
