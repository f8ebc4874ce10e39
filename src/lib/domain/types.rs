use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Ordered conversation history exchanged with the model.
///
/// Messages can only be appended; nothing already recorded is rewritten.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Metadata for one invocable capability discovered on a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Build a descriptor from one entry of a `tools/list` result.
    pub fn from_listing(entry: &Value) -> Option<Self> {
        let name = entry.get("name").and_then(Value::as_str)?;
        let description = entry
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Tool: {name}"));
        let input_schema = entry
            .get("inputSchema")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        Some(Self::new(name, description, input_schema))
    }

    /// Render the descriptor the way the system preamble lists tools.
    pub fn describe_for_model(&self) -> String {
        let required: Vec<&str> = self
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut arguments = Vec::new();
        if let Some(properties) = self.input_schema.get("properties").and_then(Value::as_object) {
            for (param, info) in properties {
                let description = info
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("No description");
                let mut line = format!("- {param}: {description}");
                if required.contains(&param.as_str()) {
                    line.push_str(" (required)");
                }
                arguments.push(line);
            }
        }

        format!(
            "Tool: {}\nDescription: {}\nArguments:\n{}",
            self.name,
            self.description,
            arguments.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_from_listing_defaults_missing_description() {
        let entry = json!({ "name": "search" });
        let descriptor = ToolDescriptor::from_listing(&entry).expect("descriptor");
        assert_eq!(descriptor.description, "Tool: search");
        assert_eq!(descriptor.input_schema, json!({}));
    }

    #[test]
    fn descriptor_without_name_is_skipped() {
        assert!(ToolDescriptor::from_listing(&json!({ "description": "x" })).is_none());
    }

    #[test]
    fn describe_marks_required_arguments() {
        let descriptor = ToolDescriptor::new(
            "search",
            "Search the web",
            json!({
                "type": "object",
                "properties": {
                    "q": { "description": "query text" },
                    "limit": {}
                },
                "required": ["q"]
            }),
        );
        let text = descriptor.describe_for_model();
        assert!(text.contains("Tool: search"));
        assert!(text.contains("- q: query text (required)"));
        assert!(text.contains("- limit: No description"));
        assert!(!text.contains("limit: No description (required)"));
    }

    #[test]
    fn transcript_only_grows() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::system("preamble"));
        transcript.push(ChatMessage::user("hello"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().map(|m| m.role), Some(MessageRole::User));
    }
}
