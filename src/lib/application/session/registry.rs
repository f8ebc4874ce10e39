use super::error::SessionError;
use super::session::Session;
use crate::application::conversation::{Conversation, ConversationOptions};
use crate::application::tooling::ProviderFactory;
use crate::config::{ProviderConfig, ProviderStore};
use crate::model::ModelStream;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OnceCell, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

type SessionSlot = Arc<OnceCell<Arc<Session>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// A configured provider and whether any live session is connected to it.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub config: ProviderConfig,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddProviderOutcome {
    Added,
    AlreadyExists,
}

/// Every live session, keyed by id.
///
/// Map mutation goes through one mutex; construction of a session happens
/// inside a per-id `OnceCell`, so concurrent requests for the same id share
/// a single set of provider connections.
pub struct SessionRegistry {
    sessions: AsyncMutex<HashMap<String, SessionSlot>>,
    providers: RwLock<Vec<ProviderConfig>>,
    factory: Arc<dyn ProviderFactory>,
    model: Arc<dyn ModelStream>,
    options: ConversationOptions,
    store: Option<ProviderStore>,
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new(
        providers: Vec<ProviderConfig>,
        factory: Arc<dyn ProviderFactory>,
        model: Arc<dyn ModelStream>,
        options: ConversationOptions,
    ) -> Self {
        Self {
            sessions: AsyncMutex::new(HashMap::new()),
            providers: RwLock::new(providers),
            factory,
            model,
            options,
            store: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Persist providers added at runtime to `store`.
    pub fn with_store(mut self, store: ProviderStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Create a session under a fresh id.
    pub async fn create(&self) -> Result<Arc<Session>, SessionError> {
        let id = Uuid::new_v4().to_string();
        self.get_or_create(&id).await
    }

    pub async fn get_or_create(&self, session_id: &str) -> Result<Arc<Session>, SessionError> {
        let slot = {
            let mut sessions = self.sessions.lock().await;
            Arc::clone(sessions.entry(session_id.to_string()).or_default())
        };

        let built = slot
            .get_or_try_init(|| self.build_session(session_id))
            .await
            .map(Arc::clone);

        match built {
            Ok(session) => {
                if self.is_registered(session_id, &slot).await {
                    Ok(session)
                } else {
                    session.teardown().await;
                    Err(SessionError::TornDown {
                        session_id: session_id.to_string(),
                    })
                }
            }
            Err(err) => {
                let mut sessions = self.sessions.lock().await;
                let stale = sessions
                    .get(session_id)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot) && current.get().is_none());
                if stale {
                    sessions.remove(session_id);
                }
                Err(err)
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Sessions that finished construction, oldest first.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .lock()
            .await
            .values()
            .filter_map(|slot| slot.get())
            .map(|session| SessionSummary {
                id: session.id().to_string(),
                created_at: session.created_at(),
                last_activity: session.last_activity(),
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Remove a session and release its connections. Returns whether it existed.
    pub async fn teardown(&self, session_id: &str) -> bool {
        let slot = self.sessions.lock().await.remove(session_id);
        let Some(slot) = slot else {
            return false;
        };
        if let Some(session) = slot.get() {
            session.teardown().await;
        }
        true
    }

    /// Tear down every session concurrently.
    pub async fn teardown_all(&self) {
        let slots: Vec<SessionSlot> = self.sessions.lock().await.drain().map(|(_, slot)| slot).collect();
        let sessions: Vec<Arc<Session>> = slots.iter().filter_map(|slot| slot.get().cloned()).collect();
        info!(count = sessions.len(), "tearing down all sessions");
        join_all(sessions.iter().map(|session| session.teardown())).await;
    }

    /// Tear down every session idle for at least `max_idle`. Sessions in the
    /// middle of a turn are left alone. Returns the ids that were removed.
    pub async fn reap_idle(&self, max_idle: Duration) -> Vec<String> {
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, slot)| {
                    slot.get()
                        .is_some_and(|session| !session.is_busy() && session.idle_for() >= max_idle)
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| sessions.remove(id))
                .filter_map(|slot| slot.get().cloned())
                .collect()
        };

        join_all(expired.iter().map(|session| session.teardown())).await;
        let ids: Vec<String> = expired.iter().map(|session| session.id().to_string()).collect();
        if !ids.is_empty() {
            info!(count = ids.len(), ?max_idle, "reaped idle sessions");
        }
        ids
    }

    /// Sweep for idle sessions every `interval` until shutdown.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration, max_idle: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            debug!(?interval, ?max_idle, "session reaper started");
            loop {
                tokio::select! {
                    _ = registry.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                registry.reap_idle(max_idle).await;
            }
            debug!("session reaper stopped");
        })
    }

    /// Shut down: cancel in-flight work everywhere, then tear everything down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.teardown_all().await;
    }

    pub async fn providers(&self) -> Vec<ProviderConfig> {
        self.providers.read().await.clone()
    }

    /// Probe-connect a new provider, persist it and offer it to sessions
    /// created from now on. Existing sessions keep their provider set.
    pub async fn add_provider(&self, provider: ProviderConfig) -> Result<AddProviderOutcome, SessionError> {
        if self.has_provider(&provider.name).await {
            return Ok(AddProviderOutcome::AlreadyExists);
        }

        let probe = self.factory.build(&provider);
        let connected = probe.connect().await;
        probe.release().await;
        connected.map_err(|source| SessionError::Probe {
            name: provider.name.clone(),
            source,
        })?;

        let mut providers = self.providers.write().await;
        if providers.iter().any(|existing| existing.name == provider.name) {
            return Ok(AddProviderOutcome::AlreadyExists);
        }
        if let Some(store) = &self.store {
            store.append(&provider)?;
        }
        info!(provider = provider.name.as_str(), kind = provider.kind(), "added MCP server");
        providers.push(provider);
        Ok(AddProviderOutcome::Added)
    }

    /// Forget a provider and drop it from the store. Sessions created from
    /// now on go without it; existing sessions keep their connection.
    /// Returns whether it was configured.
    pub async fn remove_provider(&self, name: &str) -> Result<bool, SessionError> {
        let mut providers = self.providers.write().await;
        let Some(position) = providers.iter().position(|existing| existing.name == name) else {
            return Ok(false);
        };
        if let Some(store) = &self.store {
            store.remove(name)?;
        }
        providers.remove(position);
        info!(provider = name, "removed MCP server");
        Ok(true)
    }

    /// Every configured provider, flagged connected when at least one live
    /// session holds a ready connection to it.
    pub async fn provider_statuses(&self) -> Vec<ProviderStatus> {
        let live: Vec<Arc<Session>> = self
            .sessions
            .lock()
            .await
            .values()
            .filter_map(|slot| slot.get().cloned())
            .collect();

        let mut statuses = Vec::new();
        for config in self.providers().await {
            let mut connected = false;
            for session in &live {
                if session.is_connected_to(&config.name).await {
                    connected = true;
                    break;
                }
            }
            statuses.push(ProviderStatus { config, connected });
        }
        statuses
    }

    async fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .await
            .iter()
            .any(|existing| existing.name == name)
    }

    async fn is_registered(&self, session_id: &str, slot: &SessionSlot) -> bool {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    async fn build_session(&self, session_id: &str) -> Result<Arc<Session>, SessionError> {
        let providers = self.providers().await;
        let connections = providers
            .iter()
            .map(|provider| self.factory.build(provider))
            .collect();
        let cancel = self.shutdown.child_token();

        let conversation = Conversation::initialize(
            connections,
            Arc::clone(&self.model),
            self.options.clone(),
            cancel.clone(),
        )
        .await
        .map_err(|source| {
            warn!(session_id, %source, "session construction failed");
            SessionError::Provider {
                session_id: session_id.to_string(),
                source,
            }
        })?;

        info!(session_id, providers = providers.len(), "session created");
        Ok(Arc::new(Session::new(session_id.to_string(), conversation, cancel)))
    }
}
