//! Application constants
//!
//! Single source of truth for paths, markers and protocol defaults.

/// Default provider definitions file
pub const CONFIG_PATH: &str = "servers_config.json";

/// Default environment file path
pub const ENV_PATH: &str = ".env";

/// Protocol revision announced during the `initialize` handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Sentinel a model appends once the multi-step task is finished
pub const COMPLETION_MARKER: &str = "[TASK_COMPLETE]";

/// Sentinel a model emits when more follow-up steps are coming
pub const CONTINUE_MARKER: &str = "[CONTINUE]";

/// Safety bound on model rounds per user message
pub const DEFAULT_MAX_ROUNDS: usize = 8;

/// Fixed sampling temperature for every completion request
pub const MODEL_TEMPERATURE: f32 = 0.0;

/// Fixed maximum output size for every completion request
pub const MODEL_MAX_TOKENS: u32 = 4096;

/// Interval between heartbeat pings on streamed-remote providers
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Sessions without a turn for this long are torn down
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 1800;

/// Interval between idle-session sweeps
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 600;
