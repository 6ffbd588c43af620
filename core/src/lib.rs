//! Root of the `folio-core` library.
//!
//! Everything between the backend's event stream and a rendered chat message
//! lives here: the wire framer, the accumulation/deduplication pass, the
//! inline directive extractor, the JSON repair engine, and the per-message
//! lifecycle that ties them together. The front end only ever consumes the
//! immutable [`folio_protocol::Message`] snapshots this crate publishes.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output is the front end's job; diagnostics go through the
// tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod client;
pub mod config;
mod contact;
mod conversation;
mod dedup;
mod default_client;
mod directive;
pub mod error;
pub mod flags;
mod lifecycle;
mod repair;
mod session;
mod sse;
mod util;

pub use client::ChatClient;
pub use client::ResponseStream;
pub use client::StreamUpdate;
pub use contact::CONTACT_EMAIL;
pub use contact::default_contact_payload;
pub use conversation::ConversationHistory;
pub use dedup::dedup_stream_text;
pub use directive::Extraction;
pub use directive::extract_directives;
pub use error::FolioErr;
pub use error::Result;
pub use lifecycle::LifecycleState;
pub use lifecycle::MessageLifecycle;
pub use repair::RepairOutcome;
pub use repair::repair_json;
pub use session::ChatSession;
pub use session::TurnHandle;
pub use sse::SseFrames;
pub use sse::SseStreamExt;
