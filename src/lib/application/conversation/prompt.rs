use super::orchestrator::ConversationOptions;
use crate::types::ToolDescriptor;
use std::sync::Arc;

/// System preamble: available tools, the tool-call grammar and both markers.
pub fn build_preamble(
    tools: &[Arc<ToolDescriptor>],
    guidance: &[(String, String)],
    options: &ConversationOptions,
) -> String {
    let mut sections = Vec::new();

    if tools.is_empty() {
        sections.push("You are a helpful assistant. No tools are currently available.".to_string());
    } else {
        let listing = tools
            .iter()
            .map(|tool| tool.describe_for_model())
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!(
            "You are a helpful assistant with access to these tools:\n\n{listing}"
        ));
    }

    for (server, instruction) in guidance {
        sections.push(format!("Server '{server}' guidance: {instruction}"));
    }

    sections.push(
        "Choose the appropriate tool based on the user's question. \
         If no tool is needed, reply directly."
            .to_string(),
    );
    sections.push(
        "IMPORTANT: When you need to use a tool, you must ONLY respond with \
         the exact JSON object format below, with no text before or after it:\n\
         {\n    \"tool\": \"tool-name\",\n    \"arguments\": {\n        \"argument-name\": \"value\"\n    }\n}"
            .to_string(),
    );
    sections.push(format!(
        "After receiving a tool's response:\n\
         1. Transform the raw data into a natural, conversational response\n\
         2. Keep responses concise but informative\n\
         3. Focus on the most relevant information\n\
         4. Use appropriate context from the user's question\n\
         5. Avoid simply repeating the raw data\n\
         6. When all tasks are completed, end your response with '{}'\n\
         7. If there are follow-up steps still to do, include '{}' to indicate them",
        options.completion_marker, options.continue_marker
    ));
    sections.push("Please use only the tools that are explicitly defined above.".to_string());

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preamble_lists_tools_and_markers() {
        let tools = vec![Arc::new(ToolDescriptor::new(
            "search",
            "Search the web",
            json!({ "properties": { "q": { "description": "query" } }, "required": ["q"] }),
        ))];
        let preamble = build_preamble(&tools, &[], &ConversationOptions::default());
        assert!(preamble.contains("Tool: search"));
        assert!(preamble.contains("- q: query (required)"));
        assert!(preamble.contains("[TASK_COMPLETE]"));
        assert!(preamble.contains("[CONTINUE]"));
        assert!(preamble.contains("\"tool\": \"tool-name\""));
    }

    #[test]
    fn server_guidance_is_included() {
        let guidance = vec![("fs".to_string(), "paths are relative".to_string())];
        let preamble = build_preamble(&[], &guidance, &ConversationOptions::default());
        assert!(preamble.contains("No tools are currently available"));
        assert!(preamble.contains("Server 'fs' guidance: paths are relative"));
    }
}
