//! Message adapters - convert between domain types and API formats

use crate::domain::types::{ChatMessage, MessageRole, ToolDefinition};
use serde_json::{Value, json};

pub struct MessageAdapter;

impl MessageAdapter {
    /// OpenAI-style messages, with the system prompt first when present.
    pub fn to_openai_format(system_prompt: &str, messages: &[ChatMessage]) -> Vec<Value> {
        let system = (!system_prompt.trim().is_empty())
            .then(|| json!({ "role": "system", "content": system_prompt }));
        system
            .into_iter()
            .chain(messages.iter().map(Self::openai_message))
            .collect()
    }

    fn openai_message(message: &ChatMessage) -> Value {
        match message.role {
            MessageRole::Assistant if !message.tool_calls.is_empty() => {
                let calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.input.to_string(),
                            }
                        })
                    })
                    .collect();
                let content = if message.content.is_empty() {
                    Value::Null
                } else {
                    Value::String(message.content.clone())
                };
                json!({ "role": "assistant", "content": content, "tool_calls": calls })
            }
            MessageRole::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            }),
            role => json!({ "role": role.as_str(), "content": message.content }),
        }
    }

    /// Function-calling tool list.
    pub fn to_openai_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }
}
