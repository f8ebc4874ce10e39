use super::connection::ManagedConnection;
use super::interface::{Connector, ProviderConnection};
use super::process::ProcessConnector;
use super::remote::RemoteConnector;
use super::retry::RetryPolicy;
use crate::config::{ProviderConfig, TransportConfig};
use std::sync::Arc;

/// Builds an unconnected [`ProviderConnection`] for a provider definition.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, provider: &ProviderConfig) -> Arc<dyn ProviderConnection>;
}

/// Picks connector and retry policy from the provider's transport kind.
#[derive(Clone)]
pub struct TransportFactory {
    http: reqwest::Client,
    heartbeat: bool,
}

impl TransportFactory {
    pub fn new(heartbeat: bool) -> Self {
        Self::with_client(reqwest::Client::new(), heartbeat)
    }

    pub fn with_client(http: reqwest::Client, heartbeat: bool) -> Self {
        Self { http, heartbeat }
    }

    pub fn policy_for(&self, provider: &ProviderConfig) -> RetryPolicy {
        match provider.transport {
            TransportConfig::LocalProcess(_) => RetryPolicy::local_process(),
            TransportConfig::StreamedRemote(_) => {
                let policy = RetryPolicy::streamed_remote();
                if self.heartbeat {
                    policy
                } else {
                    policy.with_heartbeat(None)
                }
            }
        }
    }
}

impl ProviderFactory for TransportFactory {
    fn build(&self, provider: &ProviderConfig) -> Arc<dyn ProviderConnection> {
        let policy = self.policy_for(provider);
        let timeout = policy.request_timeout;
        let connector: Box<dyn Connector> = match &provider.transport {
            TransportConfig::LocalProcess(config) => Box::new(ProcessConnector::new(
                provider.name.clone(),
                config.clone(),
                timeout,
            )),
            TransportConfig::StreamedRemote(config) => Box::new(RemoteConnector::new(
                provider.name.clone(),
                config.clone(),
                self.http.clone(),
                timeout,
            )),
        };
        Arc::new(ManagedConnection::new(provider.name.clone(), connector, policy))
    }
}
