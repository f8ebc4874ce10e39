use super::directive::{MarkerFilter, ToolCall, parse_tool_call, strip_marker};
use super::events::TurnEvent;
use super::prompt::build_preamble;
use super::render::{progress_of, render_tool_result};
use crate::application::tooling::{
    CapabilityCatalog, ProviderConnection, ProviderError, spawn_heartbeat,
};
use crate::constants::{COMPLETION_MARKER, CONTINUE_MARKER, DEFAULT_MAX_ROUNDS};
use crate::model::ModelStream;
use crate::types::{ChatMessage, Transcript};
use futures::StreamExt;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOptions {
    /// Upper bound on model calls per user message
    pub max_rounds: usize,
    pub completion_marker: String,
    pub continue_marker: String,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            completion_marker: COMPLETION_MARKER.to_string(),
            continue_marker: CONTINUE_MARKER.to_string(),
        }
    }
}

impl ConversationOptions {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model emitted the completion marker.
    Completed,
    /// A plain answer without a continue marker.
    NoFollowUp,
    /// The model asked for a tool nobody provides.
    UnknownTool,
    TurnLimit,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Last assistant message recorded for this turn, markers removed.
    pub reply: String,
    pub rounds: usize,
    pub tool_calls: usize,
    pub stop: StopReason,
}

/// Drives one session's transcript through model rounds and tool calls.
pub struct Conversation {
    catalog: CapabilityCatalog,
    model: Arc<dyn ModelStream>,
    transcript: Transcript,
    options: ConversationOptions,
    advertised: Vec<String>,
    heartbeats: Vec<JoinHandle<()>>,
    heartbeat_cancel: CancellationToken,
    cancel: CancellationToken,
}

impl Conversation {
    /// Connect every provider concurrently and seed the transcript with the
    /// system preamble. If any provider fails, all of them are released.
    pub async fn initialize(
        connections: Vec<Arc<dyn ProviderConnection>>,
        model: Arc<dyn ModelStream>,
        options: ConversationOptions,
        cancel: CancellationToken,
    ) -> Result<Self, ProviderError> {
        let results = join_all(connections.iter().map(|connection| connection.connect())).await;
        let mut failure = None;
        for (connection, result) in connections.iter().zip(results) {
            if let Err(err) = result {
                warn!(server = connection.name(), %err, "provider failed to connect");
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }
        if let Some(err) = failure {
            join_all(connections.iter().map(|connection| connection.release())).await;
            return Err(err);
        }

        let heartbeat_cancel = cancel.child_token();
        let heartbeats = connections
            .iter()
            .filter_map(|connection| {
                connection.heartbeat_interval().map(|interval| {
                    spawn_heartbeat(Arc::clone(connection), interval, heartbeat_cancel.clone())
                })
            })
            .collect();

        let catalog = CapabilityCatalog::new(connections);
        let mut conversation = Self {
            catalog,
            model,
            transcript: Transcript::new(),
            options,
            advertised: Vec::new(),
            heartbeats,
            heartbeat_cancel,
            cancel,
        };
        conversation.refresh_catalog().await;
        info!(
            providers = conversation.catalog.connections().len(),
            tools = conversation.advertised.len(),
            "conversation initialized"
        );
        Ok(conversation)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &ConversationOptions {
        &self.options
    }

    /// Re-read the tool catalog and append a fresh preamble if the set of
    /// tool names changed. Returns whether it did.
    ///
    /// Turns never call this; the preamble built at initialization stays in
    /// force until the owner asks for a refresh.
    pub async fn refresh_catalog(&mut self) -> bool {
        let tools = self.catalog.list_tools().await;
        let names: Vec<String> = tools.iter().map(|tool| tool.name.clone()).collect();
        if !self.transcript.is_empty() && names == self.advertised {
            return false;
        }
        let guidance = self.catalog.instructions().await;
        self.transcript
            .push(ChatMessage::system(build_preamble(&tools, &guidance, &self.options)));
        debug!(tools = names.len(), "system preamble updated");
        self.advertised = names;
        true
    }

    /// Run one user message to a terminal state, forwarding events to `events`.
    ///
    /// A dropped receiver does not abort the turn; the transcript is always
    /// completed.
    pub async fn process_message(
        &mut self,
        input: &str,
        events: &mpsc::Sender<TurnEvent>,
    ) -> TurnOutcome {
        self.transcript.push(ChatMessage::user(input));

        let mut rounds = 0;
        let mut tool_calls = 0;
        loop {
            if rounds >= self.options.max_rounds {
                return self.turn_limit(rounds, tool_calls, events).await;
            }
            rounds += 1;
            let Some(reply) = self.stream_reply(events).await else {
                return self.cancelled(rounds, tool_calls, events).await;
            };

            let Some(call) = parse_tool_call(&reply) else {
                if reply.contains(&self.options.completion_marker) {
                    let clean = self.strip_markers(&reply);
                    self.transcript.push(ChatMessage::assistant(clean.clone()));
                    return outcome(clean, rounds, tool_calls, StopReason::Completed);
                }
                self.transcript.push(ChatMessage::assistant(reply.clone()));
                if reply.contains(&self.options.continue_marker) {
                    debug!(rounds, "model signalled follow-up steps");
                    continue;
                }
                return outcome(reply, rounds, tool_calls, StopReason::NoFollowUp);
            };

            emit(
                events,
                TurnEvent::ToolCall {
                    tool: call.tool.clone(),
                    arguments: call.arguments.clone(),
                },
            )
            .await;

            let Some(connection) = self.catalog.resolve(&call.tool).await else {
                let notice = format!("No server found with tool: {}", call.tool);
                warn!(tool = %call.tool, "model requested an unknown tool");
                self.transcript.push(ChatMessage::assistant(reply));
                self.transcript.push(ChatMessage::system(notice.clone()));
                emit(events, TurnEvent::Notice(notice.clone())).await;
                return outcome(notice, rounds, tool_calls, StopReason::UnknownTool);
            };

            tool_calls += 1;
            let Some(tool_message) = self.run_tool(connection, &call, events).await else {
                return self.cancelled(rounds, tool_calls, events).await;
            };
            self.transcript.push(ChatMessage::assistant(reply));
            self.transcript.push(ChatMessage::system(tool_message));

            if rounds >= self.options.max_rounds {
                return self.turn_limit(rounds, tool_calls, events).await;
            }
            rounds += 1;
            let Some(follow_up) = self.stream_reply(events).await else {
                return self.cancelled(rounds, tool_calls, events).await;
            };
            if follow_up.contains(&self.options.completion_marker) {
                let clean = self.strip_markers(&follow_up);
                self.transcript.push(ChatMessage::assistant(clean.clone()));
                return outcome(clean, rounds, tool_calls, StopReason::Completed);
            }
            self.transcript.push(ChatMessage::assistant(follow_up));
        }
    }

    /// Stop heartbeats and release every provider connection concurrently.
    pub async fn release(&mut self) {
        self.heartbeat_cancel.cancel();
        for handle in self.heartbeats.drain(..) {
            if let Err(err) = handle.await {
                debug!(%err, "heartbeat task ended abnormally");
            }
        }
        join_all(
            self.catalog
                .connections()
                .iter()
                .map(|connection| connection.release()),
        )
        .await;
    }

    fn strip_markers(&self, text: &str) -> String {
        let text = strip_marker(text, &self.options.completion_marker);
        strip_marker(&text, &self.options.continue_marker)
    }

    /// Collect one model reply, forwarding marker-free fragments as they come.
    async fn stream_reply(&self, events: &mpsc::Sender<TurnEvent>) -> Option<String> {
        let mut stream = self.model.stream(self.transcript.messages());
        let mut filter = MarkerFilter::new(&[
            self.options.completion_marker.as_str(),
            self.options.continue_marker.as_str(),
        ]);
        let mut reply = String::new();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                next = stream.next() => next,
            };
            let Some(fragment) = next else {
                break;
            };
            reply.push_str(&fragment);
            let visible = filter.push(&fragment);
            if !visible.is_empty() {
                emit(events, TurnEvent::Fragment(visible)).await;
            }
        }
        let rest = filter.finish();
        if !rest.is_empty() {
            emit(events, TurnEvent::Fragment(rest)).await;
        }
        Some(reply)
    }

    /// Invoke the tool and turn the outcome into the transcript's tool message.
    async fn run_tool(
        &self,
        connection: Arc<dyn ProviderConnection>,
        call: &ToolCall,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Option<String> {
        info!(server = connection.name(), tool = %call.tool, "executing tool");
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            result = connection.invoke_tool(&call.tool, call.arguments.clone()) => result,
        };

        let (text, success) = match result {
            Ok(value) => {
                if let Some((progress, total)) = progress_of(&value) {
                    emit(events, TurnEvent::Progress { progress, total }).await;
                }
                let rendered = render_tool_result(&value);
                (rendered.text, !rendered.is_error)
            }
            Err(err) => {
                warn!(tool = %call.tool, %err, "tool execution failed");
                (err.user_message(), false)
            }
        };

        let event = TurnEvent::ToolResult {
            tool: call.tool.clone(),
            text,
            success,
        };
        let message = event.to_string();
        emit(events, event).await;
        Some(message)
    }

    async fn turn_limit(
        &mut self,
        rounds: usize,
        tool_calls: usize,
        events: &mpsc::Sender<TurnEvent>,
    ) -> TurnOutcome {
        let notice = format!(
            "Stopped after {rounds} model rounds without the task being marked complete."
        );
        warn!(rounds, tool_calls, "turn reached the round limit");
        self.transcript.push(ChatMessage::system(notice.clone()));
        emit(events, TurnEvent::Notice(notice.clone())).await;
        outcome(notice, rounds, tool_calls, StopReason::TurnLimit)
    }

    async fn cancelled(
        &mut self,
        rounds: usize,
        tool_calls: usize,
        events: &mpsc::Sender<TurnEvent>,
    ) -> TurnOutcome {
        let notice = "The session was closed before this turn finished.".to_string();
        debug!(rounds, tool_calls, "turn cancelled");
        self.transcript.push(ChatMessage::system(notice.clone()));
        emit(events, TurnEvent::Notice(notice.clone())).await;
        outcome(notice, rounds, tool_calls, StopReason::Cancelled)
    }
}

fn outcome(reply: String, rounds: usize, tool_calls: usize, stop: StopReason) -> TurnOutcome {
    TurnOutcome {
        reply,
        rounds,
        tool_calls,
        stop,
    }
}

async fn emit(events: &mpsc::Sender<TurnEvent>, event: TurnEvent) {
    if events.send(event).await.is_err() {
        debug!("turn event receiver dropped");
    }
}
