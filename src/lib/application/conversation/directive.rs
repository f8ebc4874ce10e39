use serde_json::Value;

/// A tool request embedded in a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub arguments: Value,
}

/// Parse a reply that consists of exactly one tool-call object.
///
/// Anything else (surrounding prose, code fences, a missing or mistyped
/// `tool`/`arguments`) is ordinary text and yields `None`.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let value: Value = serde_json::from_str(reply.trim()).ok()?;
    let object = value.as_object()?;
    let tool = object.get("tool")?.as_str()?;
    let arguments = object.get("arguments")?;
    if tool.trim().is_empty() || !arguments.is_object() {
        return None;
    }
    Some(ToolCall {
        tool: tool.to_string(),
        arguments: arguments.clone(),
    })
}

/// Remove every occurrence of `marker` and trim the result.
pub fn strip_marker(text: &str, marker: &str) -> String {
    if marker.is_empty() {
        return text.trim().to_string();
    }
    text.replace(marker, "").trim().to_string()
}

/// Holds back streamed text that could be the start of a marker so that
/// markers split across fragments never reach the caller.
#[derive(Debug)]
pub(crate) struct MarkerFilter {
    markers: Vec<String>,
    pending: String,
}

impl MarkerFilter {
    pub(crate) fn new(markers: &[&str]) -> Self {
        Self {
            markers: markers
                .iter()
                .filter(|marker| !marker.is_empty())
                .map(|marker| marker.to_string())
                .collect(),
            pending: String::new(),
        }
    }

    pub(crate) fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        for marker in &self.markers {
            if self.pending.contains(marker.as_str()) {
                self.pending = self.pending.replace(marker.as_str(), "");
            }
        }

        let held = self
            .markers
            .iter()
            .map(|marker| partial_suffix(&self.pending, marker))
            .max()
            .unwrap_or(0);
        let split = self.pending.len() - held;
        let ready = self.pending[..split].to_string();
        self.pending.drain(..split);
        ready
    }

    pub(crate) fn finish(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

/// Length of the longest proper prefix of `marker` that `text` ends with.
fn partial_suffix(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|len| marker.is_char_boundary(*len) && text.ends_with(&marker[..*len]))
        .unwrap_or(0)
}
