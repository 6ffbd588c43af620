//! One conversation's turn orchestration.
//!
//! A submit records the user message, publishes the streaming placeholder
//! and spawns the single read loop for that turn. Events are applied to the
//! lifecycle strictly in arrival order; every transition publishes a fresh
//! snapshot to both the transcript and the caller's update channel.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use folio_protocol::HistoryMessage;
use folio_protocol::Message;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::client::ChatClient;
use crate::client::StreamUpdate;
use crate::conversation::ConversationHistory;
use crate::error::FolioErr;
use crate::error::Result;
use crate::lifecycle::MessageLifecycle;

pub struct ChatSession {
    client: Arc<ChatClient>,
    history: Arc<Mutex<ConversationHistory>>,
    turn_active: Arc<AtomicBool>,
}

/// Caller's side of an in-flight turn: a stream of message snapshots plus
/// the stop control.
pub struct TurnHandle {
    pub updates: mpsc::Receiver<Message>,
    cancel: CancellationToken,
}

impl TurnHandle {
    /// Token observed by the read loop; cancelling it is the user "stop".
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the turn, keeping whatever content has streamed in so far.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Clears the in-flight flag when the turn task finishes, however it
/// finishes.
struct TurnGuard {
    turn_active: Arc<AtomicBool>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.turn_active.store(false, Ordering::SeqCst);
    }
}

impl ChatSession {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client: Arc::new(client),
            history: Arc::new(Mutex::new(ConversationHistory::new())),
            turn_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Transcript snapshot for rendering.
    pub fn history(&self) -> Vec<Message> {
        match self.history.lock() {
            Ok(history) => history.snapshot(),
            Err(_) => Vec::new(),
        }
    }

    /// Seed the transcript from the backend's persisted history.
    pub fn load_history(&self, records: Vec<HistoryMessage>) {
        if let Ok(mut history) = self.history.lock() {
            *history = ConversationHistory::from_backend(records);
        }
    }

    /// Start one AI turn. Fails with [`FolioErr::TurnInFlight`] while a
    /// previous turn is still streaming; concurrent turns are not
    /// supported.
    pub fn submit(&self, text: &str) -> Result<TurnHandle> {
        if self.turn_active.swap(true, Ordering::SeqCst) {
            return Err(FolioErr::TurnInFlight);
        }
        let guard = TurnGuard {
            turn_active: Arc::clone(&self.turn_active),
        };

        let lifecycle = MessageLifecycle::new();
        if let Ok(mut history) = self.history.lock() {
            history.record(Message::user(text));
            history.record(lifecycle.placeholder());
        }

        let (tx_update, rx_update) = mpsc::channel::<Message>(32);
        let cancel = CancellationToken::new();

        tokio::spawn(run_turn(
            Arc::clone(&self.client),
            Arc::clone(&self.history),
            lifecycle,
            text.to_string(),
            tx_update,
            cancel.clone(),
            guard,
        ));

        Ok(TurnHandle {
            updates: rx_update,
            cancel,
        })
    }
}

/// The single read loop of one turn.
async fn run_turn(
    client: Arc<ChatClient>,
    history: Arc<Mutex<ConversationHistory>>,
    mut lifecycle: MessageLifecycle,
    text: String,
    tx_update: mpsc::Sender<Message>,
    cancel: CancellationToken,
    _guard: TurnGuard,
) {
    let publish = |snapshot: Message| {
        if let Ok(mut history) = history.lock() {
            history.replace(snapshot.clone());
        }
        snapshot
    };

    let _ = tx_update.send(publish(lifecycle.placeholder())).await;

    let style = client.config().style;
    let mut stream = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("turn stopped before the stream opened");
            let snapshot = publish(lifecycle.interrupt());
            let _ = tx_update.send(snapshot).await;
            return;
        }
        opened = client.stream_chat(&text, style) => match opened {
            Ok(stream) => stream,
            Err(err) => {
                warn!("failed to open answer stream: {err}");
                let snapshot = publish(lifecycle.fail(&err));
                let _ = tx_update.send(snapshot).await;
                return;
            }
        }
    };

    loop {
        let settled = tokio::select! {
            _ = cancel.cancelled() => {
                // User stop: keep the partial content.
                Some(lifecycle.interrupt())
            }
            update = stream.next() => match update {
                Some(Ok(StreamUpdate::Chunk(payload))) => {
                    let snapshot = publish(lifecycle.apply_chunk(&payload));
                    if tx_update.send(snapshot).await.is_err() {
                        debug!("update receiver dropped, stopping turn");
                        Some(lifecycle.interrupt())
                    } else {
                        None
                    }
                }
                Some(Ok(StreamUpdate::Completed)) | None => Some(lifecycle.complete()),
                Some(Err(err)) => {
                    warn!("answer stream failed: {err}");
                    Some(lifecycle.fail(&err))
                }
            }
        };

        if let Some(snapshot) = settled {
            let snapshot = publish(snapshot);
            let _ = tx_update.send(snapshot).await;
            return;
        }
    }
}
