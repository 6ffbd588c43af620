//! Types shared between the streaming ingestion core and the front end.
//!
//! Everything here is plain data: the chat transcript model, the structured
//! content payloads the renderer understands, and the request/response bodies
//! of the backend API. TS bindings are derived so the web front end consumes
//! the exact same shapes.

mod message;
mod message_id;
mod wire;

pub use message::ContentFormat;
pub use message::Message;
pub use message::MessageContent;
pub use message::Sender;
pub use message::StructuredContent;
pub use message_id::MessageId;
pub use wire::ChatRequest;
pub use wire::HistoryMessage;
pub use wire::HistoryResponse;
pub use wire::RemainingResponse;
pub use wire::ResponseStyle;
pub use wire::SseEvent;
