use super::error::ProviderError;
use super::interface::RpcChannel;
use crate::constants::PROTOCOL_VERSION;
use crate::types::ToolDescriptor;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// What a provider reported while the session was being established.
#[derive(Debug, Default)]
pub(super) struct Handshake {
    pub tools: Vec<Arc<ToolDescriptor>>,
    pub instructions: Option<String>,
}

/// `initialize`, then `notifications/initialized`, then the first `tools/list`.
pub(super) async fn perform(
    server: &str,
    channel: &dyn RpcChannel,
) -> Result<Handshake, ProviderError> {
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    });
    let init_result = channel.request("initialize", params).await?;
    let instructions = init_result
        .get("instructions")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(version) = init_result.get("protocolVersion").and_then(Value::as_str) {
        debug!(server, version, "provider negotiated protocol version");
    }

    channel
        .notify("notifications/initialized", json!({}))
        .await?;

    let tools = fetch_tools(server, channel).await?;
    Ok(Handshake {
        tools,
        instructions,
    })
}

pub(super) async fn fetch_tools(
    server: &str,
    channel: &dyn RpcChannel,
) -> Result<Vec<Arc<ToolDescriptor>>, ProviderError> {
    let result = channel.request("tools/list", json!({})).await?;
    let listing = result
        .get("tools")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let tools: Vec<_> = listing
        .iter()
        .filter_map(ToolDescriptor::from_listing)
        .map(Arc::new)
        .collect();
    debug!(server, count = tools.len(), "fetched tool listing");
    Ok(tools)
}
