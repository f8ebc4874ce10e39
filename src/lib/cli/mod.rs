use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::constants::CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "mcp-conductor",
    version,
    about = "Chat orchestrator that routes model tool calls to MCP servers"
)]
pub struct Cli {
    /// Provider definitions file (`mcpServers` map)
    #[arg(long, default_value = CONFIG_PATH)]
    pub config: PathBuf,
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub rest_addr: SocketAddr,
    /// Upper bound on model calls per user message
    #[arg(long)]
    pub max_rounds: Option<usize>,
    /// Disable background pings on SSE providers
    #[arg(long)]
    pub no_heartbeat: bool,
}
