use super::error::ProviderError;
use super::interface::{Connector, RpcChannel};
use super::rpc::{self, Inbound, PendingRequests};
use crate::config::{ProviderConfig, StreamedRemoteConfig, TransportConfig};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_eventsource::{Event, EventSource, retry};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Opens a server-sent-event stream and posts requests to the endpoint it announces.
pub struct RemoteConnector {
    name: String,
    config: StreamedRemoteConfig,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl RemoteConnector {
    pub fn new(
        name: impl Into<String>,
        config: StreamedRemoteConfig,
        http: reqwest::Client,
        request_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            http,
            request_timeout,
        }
    }

    pub fn from_provider(
        provider: &ProviderConfig,
        http: reqwest::Client,
        request_timeout: Duration,
    ) -> Option<Self> {
        match &provider.transport {
            TransportConfig::StreamedRemote(config) => Some(Self::new(
                provider.name.clone(),
                config.clone(),
                http,
                request_timeout,
            )),
            TransportConfig::LocalProcess(_) => None,
        }
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut map = HeaderMap::new();
        for (key, value) in &self.config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
                ProviderError::transport(&self.name, format!("invalid header '{key}': {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                ProviderError::transport(&self.name, format!("invalid header '{key}': {err}"))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Read the stream until the provider announces where requests go.
    async fn await_endpoint(&self, base: &Url, source: &mut EventSource) -> Result<Url, ProviderError> {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => debug!(server = %self.name, "event stream opened"),
                Ok(Event::Message(message)) if message.event == "endpoint" => {
                    return base.join(message.data.trim()).map_err(|err| {
                        ProviderError::transport(
                            &self.name,
                            format!("invalid endpoint '{}': {err}", message.data),
                        )
                    });
                }
                Ok(Event::Message(message)) => {
                    debug!(server = %self.name, event = %message.event, "ignoring event before endpoint");
                }
                Err(err) => return Err(ProviderError::transport(&self.name, err.to_string())),
            }
        }
        Err(ProviderError::Terminated {
            server: self.name.clone(),
        })
    }
}

#[async_trait]
impl Connector for RemoteConnector {
    async fn open(&self) -> Result<Arc<dyn RpcChannel>, ProviderError> {
        let base = Url::parse(&self.config.url)
            .map_err(|err| ProviderError::transport(&self.name, err.to_string()))?;
        let headers = self.headers()?;

        let request = self.http.get(base.clone()).headers(headers.clone());
        let mut source = EventSource::new(request)
            .map_err(|err| ProviderError::transport(&self.name, err.to_string()))?;
        source.set_retry_policy(Box::new(retry::Never));

        let endpoint = match tokio::time::timeout(
            self.request_timeout,
            self.await_endpoint(&base, &mut source),
        )
        .await
        {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(err)) => {
                source.close();
                return Err(err);
            }
            Err(_) => {
                source.close();
                return Err(ProviderError::Timeout {
                    server: self.name.clone(),
                    method: "endpoint".to_string(),
                    seconds: self.request_timeout.as_secs(),
                });
            }
        };
        debug!(server = %self.name, %endpoint, "provider announced message endpoint");

        let shared = Arc::new(SseShared {
            server: self.name.clone(),
            http: self.http.clone(),
            endpoint,
            headers,
            pending: PendingRequests::new(self.name.clone()),
            tools_changed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let reader_shared = Arc::clone(&shared);
        let reader = tokio::spawn(async move {
            reader_shared.reader_loop(source).await;
        });

        Ok(Arc::new(SseChannel {
            shared,
            reader: AsyncMutex::new(Some(reader)),
            request_timeout: self.request_timeout,
        }))
    }
}

struct SseShared {
    server: String,
    http: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
    pending: PendingRequests,
    tools_changed: AtomicBool,
    closed: AtomicBool,
}

impl SseShared {
    async fn reader_loop(&self, mut source: EventSource) {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    if message.event != "message" && !message.event.is_empty() {
                        debug!(server = %self.server, event = %message.event, "ignoring event");
                        continue;
                    }
                    match serde_json::from_str::<Value>(&message.data) {
                        Ok(value) => self.dispatch(value).await,
                        Err(err) => warn!(
                            server = %self.server,
                            data = %message.data,
                            %err,
                            "received invalid JSON from MCP server"
                        ),
                    }
                }
                Err(err) => {
                    warn!(server = %self.server, %err, "event stream failed");
                    break;
                }
            }
        }

        source.close();
        self.closed.store(true, Ordering::SeqCst);
        self.pending.fail_all().await;
    }

    async fn dispatch(&self, value: Value) {
        match rpc::classify(value) {
            Inbound::Response { id, message } => self.pending.resolve(&id, message).await,
            Inbound::Request { id, method } => {
                if method != "ping" {
                    warn!(server = %self.server, %method, "server sent unsupported request");
                }
                let reply = rpc::server_request_reply(id, &method);
                if let Err(err) = self.post(&reply).await {
                    warn!(server = %self.server, %err, "failed to answer server request");
                }
            }
            Inbound::Notification { method } => {
                debug!(server = %self.server, %method, "received notification from server");
                if method == rpc::TOOLS_CHANGED {
                    self.tools_changed.store(true, Ordering::SeqCst);
                }
            }
            Inbound::Unknown => {}
        }
    }

    async fn post(&self, message: &Value) -> Result<(), ProviderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Terminated {
                server: self.server.clone(),
            });
        }
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(message)
            .send()
            .await
            .map_err(|err| ProviderError::transport(&self.server, format!("connection error: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::transport(
                &self.server,
                format!("endpoint responded with {status}: {body}"),
            ));
        }
        Ok(())
    }
}

struct SseChannel {
    shared: Arc<SseShared>,
    reader: AsyncMutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

#[async_trait]
impl RpcChannel for SseChannel {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let pending = &self.shared.pending;
        let (id, rx) = pending.register().await;
        if let Err(err) = self.shared.post(&rpc::request_message(&id, method, params)).await {
            pending.forget(&id).await;
            return Err(err);
        }
        pending.wait(&id, method, rx, self.request_timeout).await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ProviderError> {
        self.shared
            .post(&rpc::notification_message(method, params))
            .await
    }

    async fn close(&self) -> Result<(), ProviderError> {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.pending.fail_all().await;
        Ok(())
    }

    fn take_tools_changed(&self) -> bool {
        self.shared.tools_changed.swap(false, Ordering::SeqCst)
    }
}

impl Drop for SseChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}
