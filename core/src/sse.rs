//! Incremental framing of the backend's `text/event-stream` body.
//!
//! The transport delimits records with a blank line. Within a record a
//! `:`-prefixed line is a heartbeat, `event:` names the record and `data:`
//! carries the payload. Records without a `data:` line are discarded. The
//! framer is fed raw byte chunks as they arrive, so both a multi-byte
//! character and a record boundary can be split across chunks; all of that
//! state lives here.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use bytes::Bytes;
use folio_protocol::SseEvent;
use futures::Stream;
use tracing::trace;

use crate::error::FolioErr;
use crate::error::Result;

/// Streaming UTF-8 decoder. An incomplete trailing sequence is buffered
/// until the next chunk completes it; invalid bytes decode to U+FFFD.
#[derive(Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match err.error_len() {
                        // Incomplete sequence at the tail: keep it for the
                        // next chunk.
                        None => {
                            self.pending.drain(..valid_up_to);
                            return out;
                        }
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid_up_to + bad);
                        }
                    }
                }
            }
        }
    }
}

/// Accumulates decoded text and cuts it into records at blank lines.
#[derive(Default)]
pub(crate) struct SseFramer {
    decoder: Utf8Decoder,
    buffer: String,
}

impl SseFramer {
    /// Feed one chunk of body bytes; returns every record completed by it.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let decoded = self.decoder.push(chunk);
        self.buffer.push_str(&decoded);

        let mut events = Vec::new();
        while let Some((at, len)) = find_record_boundary(&self.buffer) {
            let record = self.buffer[..at].to_string();
            self.buffer.replace_range(..at + len, "");
            if let Some(event) = parse_record(&record) {
                events.push(event);
            }
        }
        events
    }

    /// Frame whatever is left once the stream ends. The final record often
    /// lacks its blank-line terminator.
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return None;
        }
        parse_record(&rest)
    }
}

/// Position and byte length of the earliest record delimiter, tolerating
/// `\r\n` line endings.
fn find_record_boundary(buffer: &str) -> Option<(usize, usize)> {
    let lf = buffer.find("\n\n").map(|at| (at, 2));
    let crlf = buffer.find("\r\n\r\n").map(|at| (at, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(std::cmp::min_by_key(a, b, |(at, _)| *at)),
        (a, b) => a.or(b),
    }
}

fn parse_record(record: &str) -> Option<SseEvent> {
    let mut name: Option<String> = None;
    let mut data: Option<String> = None;

    for line in record.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            // Heartbeat comment; keeps the connection alive, carries nothing.
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                name = Some(rest.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.trim_start();
            if !rest.is_empty() {
                // Last data line wins.
                data = Some(rest.to_string());
            }
        }
    }

    if data.is_none() {
        trace!("discarding record without data line: {record:?}");
    }
    data.map(|data| SseEvent { name, data })
}

/// Lazy, finite, non-restartable sequence of framed records over a byte
/// stream. Exhaustion of the inner stream ends the sequence normally; the
/// caller decides what an absent terminal record means.
pub struct SseFrames<S> {
    inner: S,
    framer: SseFramer,
    queued: VecDeque<SseEvent>,
    ended: bool,
}

impl<S, E> Stream for SseFrames<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.queued.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.ended {
                return Poll::Ready(None);
            }
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.queued.extend(this.framer.push(&chunk));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.ended = true;
                    return Poll::Ready(Some(Err(FolioErr::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.ended = true;
                    if let Some(event) = this.framer.finish() {
                        this.queued.push_back(event);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extension hanging [`SseFrames`] off any byte stream.
pub trait SseStreamExt<E>: Stream<Item = std::result::Result<Bytes, E>> + Sized {
    fn sse_frames(self) -> SseFrames<Self> {
        SseFrames {
            inner: self,
            framer: SseFramer::default(),
            queued: VecDeque::new(),
            ended: false,
        }
    }
}

impl<T, E> SseStreamExt<E> for T where T: Stream<Item = std::result::Result<Bytes, E>> + Sized {}
