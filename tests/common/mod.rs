// Shared fakes for integration tests: a scripted model and in-memory
// provider connections.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use mcp_conductor::config::ProviderConfig;
use mcp_conductor::model::ModelStream;
use mcp_conductor::tooling::{ConnectionState, ProviderConnection, ProviderError, ProviderFactory};
use mcp_conductor::types::{ChatMessage, ToolDescriptor};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Scripted model
// ============================================================================

/// Replies with queued fragment lists, one list per `stream` call.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Vec<String>>>,
    fallback: Option<String>,
    hang_when_empty: bool,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|reply| vec![reply.to_string()]).collect()),
            ..Self::default()
        }
    }

    /// Each reply is delivered as the given fragments.
    pub fn fragmented(replies: Vec<Vec<&str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|fragments| fragments.into_iter().map(str::to_string).collect())
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Once the queue is empty, answer every call with `reply`.
    pub fn repeating(reply: &str) -> Self {
        Self {
            fallback: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// A model whose stream never produces anything.
    pub fn hanging() -> Self {
        Self {
            hang_when_empty: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().expect("seen lock").len()
    }

    /// Transcript passed to the `index`-th call.
    pub fn transcript_at(&self, index: usize) -> Vec<ChatMessage> {
        self.seen.lock().expect("seen lock")[index].clone()
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> Option<Vec<String>> {
        self.seen.lock().expect("seen lock").push(messages.to_vec());
        let queued = self.replies.lock().expect("replies lock").pop_front();
        queued.or_else(|| {
            if self.hang_when_empty {
                None
            } else {
                Some(vec![self.fallback.clone().unwrap_or_default()])
            }
        })
    }
}

#[async_trait]
impl ModelStream for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> String {
        self.next_reply(messages).unwrap_or_default().concat()
    }

    fn stream(&self, messages: &[ChatMessage]) -> BoxStream<'static, String> {
        match self.next_reply(messages) {
            Some(fragments) => stream::iter(fragments).boxed(),
            None => stream::pending().boxed(),
        }
    }
}

// ============================================================================
// Stub provider connections
// ============================================================================

/// In-memory provider with fixed tools and queued invocation results.
pub struct StubConnection {
    name: String,
    tools: Vec<Arc<ToolDescriptor>>,
    fail_connect: bool,
    state: Mutex<ConnectionState>,
    results: Mutex<VecDeque<Result<Value, ProviderError>>>,
    pub connects: AtomicUsize,
    pub releases: AtomicUsize,
    pub invocations: Mutex<Vec<(String, Value)>>,
}

impl StubConnection {
    pub fn new(name: &str, tools: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tools: tools
                .iter()
                .map(|tool| {
                    Arc::new(ToolDescriptor::new(
                        *tool,
                        format!("{tool} tool"),
                        json!({ "type": "object", "properties": {} }),
                    ))
                })
                .collect(),
            fail_connect: false,
            state: Mutex::new(ConnectionState::Disconnected),
            results: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail_connect: true,
            ..Self::new(name, &[])
        }
    }

    pub fn with_results(self, results: Vec<Result<Value, ProviderError>>) -> Self {
        *self.results.lock().expect("results lock") = results.into();
        self
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().expect("invocations lock").len()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderConnection for StubConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock")
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            *self.state.lock().expect("state lock") = ConnectionState::Failed;
            return Err(ProviderError::Connection {
                server: self.name.clone(),
                attempts: 1,
                source: Box::new(ProviderError::transport(&self.name, "connection refused")),
            });
        }
        *self.state.lock().expect("state lock") = ConnectionState::Ready;
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<Arc<ToolDescriptor>>, ProviderError> {
        if *self.state.lock().expect("state lock") != ConnectionState::Ready {
            return Err(ProviderError::NotReady {
                server: self.name.clone(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<Value, ProviderError> {
        self.invocations
            .lock()
            .expect("invocations lock")
            .push((name.to_string(), arguments));
        self.results
            .lock()
            .expect("results lock")
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "content": [{ "type": "text", "text": "ok" }] })))
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().expect("state lock") = ConnectionState::Disconnected;
    }
}

pub fn connections(stubs: &[Arc<StubConnection>]) -> Vec<Arc<dyn ProviderConnection>> {
    stubs
        .iter()
        .map(|stub| Arc::clone(stub) as Arc<dyn ProviderConnection>)
        .collect()
}

// ============================================================================
// Stub factory
// ============================================================================

#[derive(Clone)]
pub struct StubPlan {
    pub tools: Vec<&'static str>,
    pub fail_connect: bool,
}

/// Builds stub connections by provider name and remembers every one it built.
#[derive(Default)]
pub struct StubFactory {
    plans: Mutex<HashMap<String, StubPlan>>,
    built: Mutex<Vec<Arc<StubConnection>>>,
}

impl StubFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, tools: Vec<&'static str>) -> Self {
        self.plans.lock().expect("plans lock").insert(
            name.to_string(),
            StubPlan {
                tools,
                fail_connect: false,
            },
        );
        self
    }

    pub fn with_failing(self, name: &str) -> Self {
        self.plans.lock().expect("plans lock").insert(
            name.to_string(),
            StubPlan {
                tools: Vec::new(),
                fail_connect: true,
            },
        );
        self
    }

    pub fn built(&self) -> Vec<Arc<StubConnection>> {
        self.built.lock().expect("built lock").clone()
    }
}

impl ProviderFactory for StubFactory {
    fn build(&self, provider: &ProviderConfig) -> Arc<dyn ProviderConnection> {
        let plan = self
            .plans
            .lock()
            .expect("plans lock")
            .get(&provider.name)
            .cloned()
            .unwrap_or(StubPlan {
                tools: Vec::new(),
                fail_connect: false,
            });
        let stub = if plan.fail_connect {
            StubConnection::failing(&provider.name)
        } else {
            StubConnection::new(&provider.name, &plan.tools)
        };
        let stub = Arc::new(stub);
        self.built.lock().expect("built lock").push(Arc::clone(&stub));
        stub
    }
}

pub fn local_provider(name: &str) -> ProviderConfig {
    ProviderConfig::local_process(name, format!("/usr/local/bin/{name}"))
}
