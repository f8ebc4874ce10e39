//! Model types - wire payloads and the transport error

use crate::types::ChatMessage;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Body posted to the chat-completions endpoint.
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
    }
}

/// Model endpoint failures. These never leave the client; they are turned
/// into reply text.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error calling model endpoint '{endpoint}': {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model endpoint '{endpoint}' responded with {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("model endpoint '{endpoint}' returned invalid response: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
    #[error("model endpoint '{endpoint}' sent nothing for {}s", idle.as_secs())]
    Stalled { endpoint: String, idle: Duration },
}

impl ModelError {
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn invalid_response(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ModelError::Network { source, .. } => {
                if source.is_connect() {
                    "could not connect to the model endpoint".to_string()
                } else if source.is_timeout() {
                    "the model endpoint timed out".to_string()
                } else {
                    format!("network error talking to the model: {source}")
                }
            }
            ModelError::Status { status, .. } => match *status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    "the model endpoint rejected the API key".to_string()
                }
                StatusCode::TOO_MANY_REQUESTS => "the model endpoint is rate limiting".to_string(),
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                    "the model endpoint is unavailable".to_string()
                }
                other => format!("the model request failed with status {}", other.as_u16()),
            },
            ModelError::InvalidResponse { reason, .. } => {
                format!("the model returned an unexpected response ({reason})")
            }
            ModelError::Stalled { idle, .. } => {
                format!("the model endpoint stopped responding for {}s", idle.as_secs())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_has_fixed_sampling_fields() {
        let messages = vec![ChatMessage::user("hi")];
        let body = serde_json::to_value(CompletionRequest {
            messages: &messages,
            model: "m",
            temperature: 0.0,
            max_tokens: 4096,
            stream: true,
        })
        .expect("serialize");
        assert_eq!(
            body,
            json!({
                "messages": [{ "role": "user", "content": "hi" }],
                "model": "m",
                "temperature": 0.0,
                "max_tokens": 4096,
                "stream": true
            })
        );
    }

    #[test]
    fn content_is_read_from_first_choice() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
        }))
        .expect("deserialize");
        assert_eq!(response.into_content().as_deref(), Some("hello"));
    }

    #[test]
    fn status_errors_have_readable_messages() {
        let err = ModelError::Status {
            endpoint: "e".into(),
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };
        assert!(err.user_message().contains("API key"));
    }

    #[test]
    fn stalled_stream_names_the_idle_window() {
        let err = ModelError::Stalled {
            endpoint: "e".into(),
            idle: Duration::from_secs(7),
        };
        assert_eq!(err.user_message(), "the model endpoint stopped responding for 7s");
    }
}
