use super::interface::{ConnectionState, ProviderConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ping `connection` every `interval` until `cancel` fires.
///
/// A failed ping releases the connection and tries to connect again; a
/// connection left `Failed` or `Disconnected` gets a fresh connect attempt on
/// every tick. Nothing here ever stops the loop except cancellation.
pub fn spawn_heartbeat(
    connection: Arc<dyn ProviderConnection>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let server = connection.name().to_string();
        debug!(server = %server, ?interval, "heartbeat started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            match connection.state().await {
                ConnectionState::Ready => {
                    let Err(err) = connection.ping().await else {
                        continue;
                    };
                    warn!(server = %server, %err, "heartbeat failed, reconnecting");
                    connection.release().await;
                }
                ConnectionState::Failed | ConnectionState::Disconnected => {
                    debug!(server = %server, "connection is down, retrying");
                }
                ConnectionState::Connecting => continue,
            }
            match connection.connect().await {
                Ok(()) => info!(server = %server, "reconnected after heartbeat failure"),
                Err(err) => warn!(server = %server, %err, "reconnect after heartbeat failure failed"),
            }
        }
        debug!(server = %server, "heartbeat stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::error::ProviderError;
    use crate::types::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Flaky {
        pings: AtomicUsize,
        connects: AtomicUsize,
        releases: AtomicUsize,
    }

    #[async_trait]
    impl ProviderConnection for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn state(&self) -> ConnectionState {
            ConnectionState::Ready
        }
        async fn connect(&self) -> Result<(), ProviderError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::transport("flaky", "still down"))
        }
        async fn list_tools(&self) -> Result<Vec<Arc<ToolDescriptor>>, ProviderError> {
            Ok(Vec::new())
        }
        async fn invoke_tool(&self, _name: &str, _arguments: Value) -> Result<Value, ProviderError> {
            Ok(Value::Null)
        }
        async fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
        async fn ping(&self) -> Result<(), ProviderError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::transport("flaky", "connection lost"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_trigger_reconnect_and_never_stop_the_loop() {
        let flaky = Arc::new(Flaky::default());
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(flaky.clone(), Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(flaky.pings.load(Ordering::SeqCst), 3);
        assert_eq!(flaky.releases.load(Ordering::SeqCst), 3);
        assert_eq!(flaky.connects.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.expect("heartbeat task joins");
    }

    struct Down {
        state: std::sync::Mutex<ConnectionState>,
        connects: AtomicUsize,
        pings: AtomicUsize,
        succeed_on: usize,
    }

    impl Down {
        fn new(succeed_on: usize) -> Self {
            Self {
                state: std::sync::Mutex::new(ConnectionState::Failed),
                connects: AtomicUsize::new(0),
                pings: AtomicUsize::new(0),
                succeed_on,
            }
        }
    }

    #[async_trait]
    impl ProviderConnection for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn state(&self) -> ConnectionState {
            *self.state.lock().expect("state lock")
        }
        async fn connect(&self) -> Result<(), ProviderError> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt == self.succeed_on {
                *self.state.lock().expect("state lock") = ConnectionState::Ready;
                return Ok(());
            }
            Err(ProviderError::transport("down", "connection refused"))
        }
        async fn list_tools(&self) -> Result<Vec<Arc<ToolDescriptor>>, ProviderError> {
            Ok(Vec::new())
        }
        async fn invoke_tool(&self, _name: &str, _arguments: Value) -> Result<Value, ProviderError> {
            Ok(Value::Null)
        }
        async fn release(&self) {}
        async fn ping(&self) -> Result<(), ProviderError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connection_is_retried_every_interval() {
        let down = Arc::new(Down::new(usize::MAX));
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(down.clone(), Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(305)).await;
        assert_eq!(down.connects.load(Ordering::SeqCst), 10);
        assert_eq!(down.pings.load(Ordering::SeqCst), 0);

        cancel.cancel();
        handle.await.expect("heartbeat task joins");
    }

    #[tokio::test(start_paused = true)]
    async fn recovered_connection_goes_back_to_pinging() {
        let down = Arc::new(Down::new(2));
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(down.clone(), Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(down.connects.load(Ordering::SeqCst), 2);
        assert_eq!(down.pings.load(Ordering::SeqCst), 2);
        assert_eq!(down.state().await, ConnectionState::Ready);

        cancel.cancel();
        handle.await.expect("heartbeat task joins");
    }
}
