use crate::application::conversation::{Conversation, TurnEvent, TurnOutcome};
use crate::application::tooling::{ConnectionState, ProviderConnection};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const EVENT_BUFFER: usize = 64;

/// One user-facing conversation plus the provider connections it owns.
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    started: Instant,
    /// Milliseconds after `started` at which a turn last began or ended.
    last_active_ms: AtomicU64,
    connections: Vec<Arc<dyn ProviderConnection>>,
    conversation: AsyncMutex<Conversation>,
    cancel: CancellationToken,
}

impl Session {
    pub(super) fn new(id: String, conversation: Conversation, cancel: CancellationToken) -> Self {
        let connections = conversation.catalog().connections().to_vec();
        Self {
            id,
            created_at: Utc::now(),
            started: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            connections,
            conversation: AsyncMutex::new(conversation),
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wall-clock time a turn last began or ended, or creation time.
    pub fn last_activity(&self) -> DateTime<Utc> {
        let offset = self.last_active_ms.load(Ordering::Relaxed);
        self.created_at + TimeDelta::milliseconds(i64::try_from(offset).unwrap_or(i64::MAX))
    }

    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    /// A turn holds the conversation.
    pub fn is_busy(&self) -> bool {
        self.conversation.try_lock().is_err()
    }

    /// Whether this session holds a `Ready` connection to provider `name`.
    pub async fn is_connected_to(&self, name: &str) -> bool {
        for connection in self.connections.iter().filter(|c| c.name() == name) {
            if connection.state().await == ConnectionState::Ready {
                return true;
            }
        }
        false
    }

    fn touch(&self) {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.store(elapsed, Ordering::Relaxed);
    }

    /// Run a turn to completion. Turns on one session never interleave.
    pub async fn run_turn(&self, input: &str, events: &mpsc::Sender<TurnEvent>) -> TurnOutcome {
        let mut conversation = self.conversation.lock().await;
        self.touch();
        debug!(session_id = self.id.as_str(), "turn started");
        let outcome = conversation.process_message(input, events).await;
        self.touch();
        info!(
            session_id = self.id.as_str(),
            rounds = outcome.rounds,
            tool_calls = outcome.tool_calls,
            stop = ?outcome.stop,
            "turn finished"
        );
        outcome
    }

    /// Start a turn in the background and stream its events.
    pub fn process_message(self: &Arc<Self>, input: impl Into<String>) -> ReceiverStream<TurnEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let session = Arc::clone(self);
        let input = input.into();
        tokio::spawn(async move {
            session.run_turn(&input, &tx).await;
        });
        ReceiverStream::new(rx)
    }

    pub async fn message_count(&self) -> usize {
        self.conversation.lock().await.transcript().len()
    }

    /// Cancel in-flight work, then release every provider connection.
    pub async fn teardown(&self) {
        self.cancel.cancel();
        let mut conversation = self.conversation.lock().await;
        conversation.release().await;
        info!(session_id = self.id.as_str(), "session torn down");
    }
}
