//! Model clients

mod base;
mod chat_completions;

pub use base::HttpClientBase;
pub use chat_completions::ChatCompletionsClient;
