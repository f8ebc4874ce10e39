//! Model traits

use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A chat model that always answers with text.
///
/// Transport failures are folded into the returned text so the
/// conversation loop always has something to reason about.
#[async_trait]
pub trait ModelStream: Send + Sync {
    /// One blocking request/response exchange.
    async fn complete(&self, messages: &[ChatMessage]) -> String;

    /// Incremental reply fragments. The stream always terminates; a failure
    /// mid-way yields one diagnostic fragment and ends.
    fn stream(&self, messages: &[ChatMessage]) -> BoxStream<'static, String>;
}
