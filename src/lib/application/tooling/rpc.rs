//! JSON-RPC plumbing shared by the stdio and SSE channels.

use super::error::ProviderError;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::debug;

pub(super) const TOOLS_CHANGED: &str = "notifications/tools/list_changed";

type Responder = oneshot::Sender<Result<Value, ProviderError>>;

/// Outstanding requests keyed by id, resolved by the channel's reader.
pub(super) struct PendingRequests {
    server: String,
    pending: AsyncMutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
}

impl PendingRequests {
    pub(super) fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
        }
    }

    pub(super) async fn register(
        &self,
    ) -> (String, oneshot::Receiver<Result<Value, ProviderError>>) {
        let id = format!("req-{}", self.id_counter.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        (id, rx)
    }

    pub(super) async fn forget(&self, id: &str) {
        self.pending.lock().await.remove(id);
    }

    pub(super) async fn wait(
        &self,
        id: &str,
        method: &str,
        rx: oneshot::Receiver<Result<Value, ProviderError>>,
        timeout: Duration,
    ) -> Result<Value, ProviderError> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ProviderError::Cancelled {
                server: self.server.clone(),
            }),
            Err(_) => {
                self.forget(id).await;
                Err(ProviderError::Timeout {
                    server: self.server.clone(),
                    method: method.to_string(),
                    seconds: timeout.as_secs(),
                })
            }
        }
    }

    /// Route a response message to whoever is waiting on its id.
    pub(super) async fn resolve(&self, id: &Value, message: Value) {
        let Some(key) = response_key(id) else {
            return;
        };
        let responder = self.pending.lock().await.remove(&key);
        let Some(sender) = responder else {
            debug!(
                server = %self.server,
                response_id = %key,
                "received response for unknown request"
            );
            return;
        };

        let outcome = match message.get("error") {
            Some(error) => Err(ProviderError::Rpc {
                server: self.server.clone(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = sender.send(outcome);
    }

    pub(super) async fn fail_all(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ProviderError::Terminated {
                server: self.server.clone(),
            }));
        }
    }
}

pub(super) enum Inbound {
    Response { id: Value, message: Value },
    Request { id: Value, method: String },
    Notification { method: String },
    Unknown,
}

pub(super) fn classify(message: Value) -> Inbound {
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);
    match (message.get("id").cloned(), method) {
        (Some(id), Some(method)) => Inbound::Request { id, method },
        (Some(id), None) => Inbound::Response { id, message },
        (None, Some(method)) => Inbound::Notification { method },
        (None, None) => Inbound::Unknown,
    }
}

pub(super) fn request_message(id: &str, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

pub(super) fn notification_message(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
}

/// Answer a request initiated by the provider. Only `ping` is supported.
pub(super) fn server_request_reply(id: Value, method: &str) -> Value {
    if method == "ping" {
        json!({ "jsonrpc": "2.0", "id": id, "result": {} })
    } else {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": -32601,
                "message": format!("client does not implement method '{method}'"),
            }
        })
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_result_and_error_responses() {
        let pending = PendingRequests::new("srv");
        let (ok_id, ok_rx) = pending.register().await;
        let (err_id, err_rx) = pending.register().await;

        pending
            .resolve(&json!(ok_id), json!({ "id": ok_id, "result": { "ok": true } }))
            .await;
        pending
            .resolve(
                &json!(err_id),
                json!({ "id": err_id, "error": { "code": -32602, "message": "bad params" } }),
            )
            .await;

        assert_eq!(ok_rx.await.expect("sent").expect("ok"), json!({ "ok": true }));
        let err = err_rx.await.expect("sent").unwrap_err();
        assert!(matches!(err, ProviderError::Rpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn fail_all_terminates_waiters() {
        let pending = PendingRequests::new("srv");
        let (_, rx) = pending.register().await;
        pending.fail_all().await;
        assert!(matches!(
            rx.await.expect("sent"),
            Err(ProviderError::Terminated { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_and_forgets_request() {
        let pending = PendingRequests::new("srv");
        let (id, rx) = pending.register().await;
        let err = pending
            .wait(&id, "tools/call", rx, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { seconds: 5, .. }));
        assert!(pending.pending.lock().await.is_empty());
    }

    #[test]
    fn classifies_inbound_messages() {
        assert!(matches!(
            classify(json!({ "id": 1, "method": "ping" })),
            Inbound::Request { method, .. } if method == "ping"
        ));
        assert!(matches!(classify(json!({ "id": 1, "result": {} })), Inbound::Response { .. }));
        assert!(matches!(
            classify(json!({ "method": TOOLS_CHANGED })),
            Inbound::Notification { .. }
        ));
    }

    #[test]
    fn unsupported_server_request_gets_method_not_found() {
        let reply = server_request_reply(json!(7), "sampling/createMessage");
        assert_eq!(reply["error"]["code"], json!(-32601));
        assert_eq!(server_request_reply(json!(8), "ping")["result"], json!({}));
    }
}
