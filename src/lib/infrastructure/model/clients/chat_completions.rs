//! OpenAI-compatible chat-completions client

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::base::HttpClientBase;
use crate::config::ModelSettings;
use crate::constants::{MODEL_MAX_TOKENS, MODEL_TEMPERATURE};
use crate::infrastructure::model::sse::{Frame, SseFrameParser};
use crate::infrastructure::model::traits::ModelStream;
use crate::infrastructure::model::types::{CompletionRequest, CompletionResponse, ModelError};
use crate::types::ChatMessage;

const STREAM_BUFFER: usize = 64;

#[derive(Clone)]
pub struct ChatCompletionsClient {
    base: HttpClientBase,
    model: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            base: HttpClientBase::new(settings.endpoint.clone(), settings.api_key.clone()),
            model: settings.model.clone(),
            timeout: settings.timeout,
        }
    }

    async fn try_complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let payload = CompletionRequest {
            messages,
            model: &self.model,
            temperature: MODEL_TEMPERATURE,
            max_tokens: MODEL_MAX_TOKENS,
            stream: false,
        };

        info!(
            model = self.model.as_str(),
            messages = messages.len(),
            "Sending completion request"
        );
        let response: CompletionResponse = self.base.post_with_bearer(&payload, self.timeout).await?;
        debug!("Received completion response");

        response
            .into_content()
            .ok_or_else(|| ModelError::invalid_response(&self.base.endpoint, "missing choices[0].message.content"))
    }
}

#[async_trait]
impl ModelStream for ChatCompletionsClient {
    async fn complete(&self, messages: &[ChatMessage]) -> String {
        match self.try_complete(messages).await {
            Ok(content) => content,
            Err(err) => {
                error!(%err, "completion request failed");
                fallback_reply(&err)
            }
        }
    }

    fn stream(&self, messages: &[ChatMessage]) -> BoxStream<'static, String> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let base = self.base.clone();
        let model = self.model.clone();
        let idle = self.timeout;
        let messages = messages.to_vec();
        tokio::spawn(async move {
            pump_stream(base, model, messages, idle, tx).await;
        });
        ReceiverStream::new(rx).boxed()
    }
}

/// Read the streamed response into `tx` until `[DONE]`, end of body or failure.
///
/// Opening the stream and every subsequent chunk must arrive within `idle`.
async fn pump_stream(
    base: HttpClientBase,
    model: String,
    messages: Vec<ChatMessage>,
    idle: Duration,
    tx: mpsc::Sender<String>,
) {
    let payload = CompletionRequest {
        messages: &messages,
        model: &model,
        temperature: MODEL_TEMPERATURE,
        max_tokens: MODEL_MAX_TOKENS,
        stream: true,
    };
    info!(model = model.as_str(), messages = messages.len(), "Opening completion stream");

    let stalled = || ModelError::Stalled {
        endpoint: base.endpoint.clone(),
        idle,
    };
    let opened = tokio::time::timeout(idle, base.open_stream(&payload))
        .await
        .unwrap_or_else(|_| Err(stalled()));
    let response = match opened {
        Ok(response) => response,
        Err(err) => {
            warn!(%err, "completion stream failed to open");
            let _ = tx.send(stream_error_fragment(&err)).await;
            return;
        }
    };

    let mut parser = SseFrameParser::new();
    let mut body = response.bytes_stream();
    loop {
        let Ok(next) = tokio::time::timeout(idle, body.next()).await else {
            let err = stalled();
            warn!(%err, "completion stream stalled");
            let _ = tx.send(stream_error_fragment(&err)).await;
            return;
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(source) => {
                let err = ModelError::network(&base.endpoint, source);
                warn!(%err, "completion stream interrupted");
                let _ = tx.send(stream_error_fragment(&err)).await;
                return;
            }
        };
        for frame in parser.push(&chunk) {
            match frame {
                Frame::Fragment(text) => {
                    if tx.send(text).await.is_err() {
                        debug!("stream consumer went away");
                        return;
                    }
                }
                Frame::Done => return,
            }
        }
    }

    for frame in parser.finish() {
        if let Frame::Fragment(text) = frame {
            let _ = tx.send(text).await;
        }
    }
}

pub(crate) fn fallback_reply(err: &ModelError) -> String {
    format!(
        "I encountered an error: {}. Please try again or rephrase your request.",
        err.user_message()
    )
}

pub(crate) fn stream_error_fragment(err: &ModelError) -> String {
    format!("[stream error: {}]", err.user_message())
}
