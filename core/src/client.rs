//! HTTP client for the portfolio chat backend.
//!
//! `stream_chat` opens the answer stream and hands back a channel-backed
//! [`ResponseStream`]; the wire-level records are digested by a spawned
//! reader so the caller only ever sees typed updates. The auxiliary
//! endpoints are thin JSON fetches bounded by the metadata timeout.

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use bytes::Bytes;
use folio_protocol::ChatRequest;
use folio_protocol::HistoryMessage;
use folio_protocol::HistoryResponse;
use folio_protocol::RemainingResponse;
use folio_protocol::ResponseStyle;
use folio_protocol::SseEvent;
use futures::Stream;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;
use tracing::trace;

use crate::config::Config;
use crate::default_client::create_client;
use crate::error::FolioErr;
use crate::error::Result;
use crate::sse::SseStreamExt;
use crate::util::backoff;

/// Typed updates of one answer stream, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// One `message` record's payload, still transport-escaped.
    Chunk(String),
    /// The turn is over: either an explicit `done` record or the stream
    /// ended, which counts as implicit completion.
    Completed,
}

/// Receiver half of an in-flight answer stream.
pub struct ResponseStream {
    rx_event: mpsc::Receiver<Result<StreamUpdate>>,
}

impl Stream for ResponseStream {
    type Item = Result<StreamUpdate>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx_event.poll_recv(cx)
    }
}

#[derive(Debug, Deserialize)]
struct DonePayload {
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: Config,
}

impl ChatClient {
    pub fn new(config: Config) -> Self {
        Self {
            client: create_client(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Open the answer stream for one user message.
    ///
    /// Retries with backoff on 429/5xx and connect errors until the retry
    /// budget runs out; any other non-2xx fails immediately. Once the
    /// response is streaming no retry happens: a broken stream surfaces as
    /// an error update instead.
    pub async fn stream_chat(&self, message: &str, style: ResponseStyle) -> Result<ResponseStream> {
        let url = self.endpoint("/api/chat/stream");
        let payload = ChatRequest {
            message: message.to_string(),
            style,
        };
        let max_retries = self.config.request_max_retries;

        debug!(url, "POST (chat stream)");
        let mut attempt = 0;
        loop {
            attempt += 1;

            let send = self
                .client
                .post(&url)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .json(&payload)
                .send();
            // The whole request, headers included, lives under the stream
            // budget; a backend that never answers settles as a timeout, not
            // a hang.
            let res = match timeout(self.config.stream_idle_timeout, send).await {
                Ok(res) => res,
                Err(_) => return Err(FolioErr::Timeout),
            };

            match res {
                Ok(resp) if resp.status().is_success() => {
                    let (tx_event, rx_event) = mpsc::channel::<Result<StreamUpdate>>(16);
                    let stream = resp.bytes_stream();
                    tokio::spawn(process_stream(
                        stream,
                        tx_event,
                        self.config.stream_idle_timeout,
                    ));
                    return Ok(ResponseStream { rx_event });
                }
                Ok(res) => {
                    let status = res.status();
                    if !(status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()) {
                        let body = (res.text().await).unwrap_or_default();
                        return Err(FolioErr::UnexpectedStatus(status, body));
                    }

                    if attempt > max_retries {
                        return Err(FolioErr::RetryLimit(status));
                    }

                    let retry_after_secs = res
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());

                    let delay = retry_after_secs
                        .map(|s| Duration::from_millis(s * 1_000))
                        .unwrap_or_else(|| backoff(attempt));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempt > max_retries {
                        return Err(e.into());
                    }
                    let delay = backoff(attempt);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Remaining question budget; the integer is owned by the server.
    pub async fn remaining(&self) -> Result<i64> {
        let url = self.endpoint("/api/remaining");
        let resp = self.get_json::<RemainingResponse>(&url).await?;
        Ok(resp.remaining)
    }

    /// Persisted conversation, oldest first, content still raw JSON.
    pub async fn history(&self) -> Result<Vec<HistoryMessage>> {
        let url = self.endpoint("/api/conversation/history");
        let resp = self.get_json::<HistoryResponse>(&url).await?;
        Ok(resp.messages)
    }

    pub async fn clear_history(&self) -> Result<()> {
        let url = self.endpoint("/api/conversation/clear");
        let send = self.client.post(&url).send();
        let resp = timeout(self.config.metadata_timeout, send)
            .await
            .map_err(|_| FolioErr::Timeout)??;
        let status = resp.status();
        if !status.is_success() {
            let body = (resp.text().await).unwrap_or_default();
            return Err(FolioErr::UnexpectedStatus(status, body));
        }
        Ok(())
    }

    /// Whether the backend answers its health probe. Any failure counts as
    /// "not ready"; this feeds the warm-up poll, not error reporting.
    pub async fn health(&self) -> bool {
        let url = self.endpoint("/api/health");
        match timeout(self.config.metadata_timeout, self.client.get(&url).send()).await {
            Ok(Ok(resp)) => resp.status().is_success(),
            Ok(Err(e)) => {
                debug!("health probe failed: {e}");
                false
            }
            Err(_) => {
                debug!("health probe timed out");
                false
            }
        }
    }

    /// Poll the health endpoint until the backend is up or `max_wait`
    /// elapses.
    pub async fn wait_until_healthy(&self, max_wait: Duration) -> Result<()> {
        const POLL_INTERVAL: Duration = Duration::from_secs(2);

        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            if self.health().await {
                return Ok(());
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(FolioErr::Timeout);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn get_json<T>(&self, url: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let send = self.client.get(url).send();
        let resp = timeout(self.config.metadata_timeout, send)
            .await
            .map_err(|_| FolioErr::Timeout)??;
        let status = resp.status();
        if !status.is_success() {
            let body = (resp.text().await).unwrap_or_default();
            return Err(FolioErr::UnexpectedStatus(status, body));
        }
        Ok(resp.json::<T>().await?)
    }
}

/// Digest framed records into typed updates until the stream settles.
///
/// Malformed records are never fatal: a `done` whose payload does not parse
/// to `{"done": true}` is skipped and processing continues with the next
/// record.
async fn process_stream<S, E>(
    stream: S,
    tx_event: mpsc::Sender<Result<StreamUpdate>>,
    idle_timeout: Duration,
) where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut frames = stream.sse_frames();

    loop {
        let frame = match timeout(idle_timeout, frames.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!("stream error: {e}");
                let _ = tx_event.send(Err(e)).await;
                return;
            }
            Ok(None) => {
                // Stream ended without a done record: implicit completion.
                let _ = tx_event.send(Ok(StreamUpdate::Completed)).await;
                return;
            }
            Err(_) => {
                let _ = tx_event.send(Err(FolioErr::Timeout)).await;
                return;
            }
        };

        trace!("stream record: {frame:?}");
        match frame.name.as_deref() {
            Some(SseEvent::DONE) => match serde_json::from_str::<DonePayload>(&frame.data) {
                Ok(DonePayload { done: true }) => {
                    let _ = tx_event.send(Ok(StreamUpdate::Completed)).await;
                    return;
                }
                Ok(_) | Err(_) => {
                    debug!("skipping malformed done record: {:?}", frame.data);
                }
            },
            Some(SseEvent::MESSAGE) | None => {
                if tx_event
                    .send(Ok(StreamUpdate::Chunk(frame.data)))
                    .await
                    .is_err()
                {
                    // Receiver hung up; stop reading.
                    return;
                }
            }
            Some(other) => {
                trace!("ignoring record with unknown event name {other:?}");
            }
        }
    }
}
