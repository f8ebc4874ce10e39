use serde_json::Value;

/// Text form of a `tools/call` result as the model gets to see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    pub text: String,
    pub is_error: bool,
}

/// Join the text parts of an MCP `content` array; anything else is compact JSON.
pub fn render_tool_result(result: &Value) -> RenderedResult {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let text = match result.get("content").and_then(Value::as_array) {
        Some(parts) => parts
            .iter()
            .map(|part| match part.get("text").and_then(Value::as_str) {
                Some(text) if part.get("type").and_then(Value::as_str).unwrap_or("text") == "text" => {
                    text.to_string()
                }
                _ => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => result.to_string(),
    };

    RenderedResult { text, is_error }
}

/// `progress`/`total` pair reported alongside a result, if any.
pub fn progress_of(result: &Value) -> Option<(f64, f64)> {
    let progress = result.get("progress").and_then(Value::as_f64)?;
    let total = result.get("total").and_then(Value::as_f64)?;
    (total > 0.0).then_some((progress, total))
}
