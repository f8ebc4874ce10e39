//! Multi-turn conversation driver: model rounds, embedded tool calls and
//! completion detection.

mod directive;
mod events;
mod orchestrator;
mod prompt;
mod render;

pub use directive::{ToolCall, parse_tool_call, strip_marker};
pub use events::TurnEvent;
pub use orchestrator::{Conversation, ConversationOptions, StopReason, TurnOutcome};
pub use prompt::build_preamble;
pub use render::{RenderedResult, progress_of, render_tool_result};
