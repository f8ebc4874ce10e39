use serde_json::Value;
use std::fmt;

/// Observable progress of one user turn.
///
/// The `Display` form is what streaming callers receive as a text fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A piece of model output, forwarded as it arrives.
    Fragment(String),
    ToolCall { tool: String, arguments: Value },
    Progress { progress: f64, total: f64 },
    ToolResult {
        tool: String,
        text: String,
        success: bool,
    },
    /// Diagnostics such as an unknown tool or the round limit.
    Notice(String),
}

impl TurnEvent {
    pub fn is_fragment(&self) -> bool {
        matches!(self, TurnEvent::Fragment(_))
    }
}

impl fmt::Display for TurnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnEvent::Fragment(text) | TurnEvent::Notice(text) => f.write_str(text),
            TurnEvent::ToolCall { tool, arguments } => {
                write!(f, "Executing tool: {tool} With arguments: {arguments}")
            }
            TurnEvent::Progress { progress, total } => {
                let percentage = progress / total * 100.0;
                write!(f, "Progress: {progress}/{total} ({percentage:.1}%)")
            }
            TurnEvent::ToolResult { text, success, .. } => {
                if *success {
                    write!(f, "Tool execution result: {text}")
                } else {
                    write!(f, "Tool execution failed: {text}")
                }
            }
        }
    }
}
