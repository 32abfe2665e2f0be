//! OpenAI-compatible client with function calling

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use super::base::HttpClientBase;
use crate::config::ProviderConfig;
use crate::config::defaults::DEFAULT_OPENAI_API_PATH;
use crate::domain::types::ToolCall;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::factory::resolve_api_key;
use crate::infrastructure::model::traits::ChatCompletion;
use crate::infrastructure::model::types::{
    CompletionRequest, CompletionResponse, ModelError, StopReason,
};

/// Works with any `/chat/completions` endpoint (OpenAI, Groq, vLLM, llama.cpp, ...).
#[derive(Clone)]
pub struct OpenAICompatClient {
    base: HttpClientBase,
    model: String,
    api_path: String,
    /// A key variable was configured, so requests without a key are refused.
    requires_key: bool,
}

impl OpenAICompatClient {
    pub fn from_config(config: &ProviderConfig) -> Self {
        let api_key = resolve_api_key(&config.id, config.api_key.as_deref());
        Self {
            base: HttpClientBase::new(config.id.clone(), config.endpoint.clone(), api_key),
            model: config.model.clone(),
            api_path: config
                .api_path
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_API_PATH.to_string()),
            requires_key: config
                .api_key
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty()),
        }
    }
}

#[async_trait]
impl ChatCompletion for OpenAICompatClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let url = self.base.build_url(&self.api_path);
        let payload = OpenAIRequest {
            model: self.model.clone(),
            messages: MessageAdapter::to_openai_format(&request.system_prompt, &request.messages),
            tools: MessageAdapter::to_openai_tools(&request.tools),
            max_tokens: request.max_tokens,
            stream: false,
        };

        info!(
            provider = self.base.id.as_str(),
            model = self.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to OpenAI-compatible provider"
        );

        let response: OpenAIResponse = if self.requires_key {
            self.base.post_with_bearer(&url, &payload).await?
        } else {
            self.base.post_json(&url, &payload).await?
        };
        let completion = into_completion(&self.base.id, response)?;
        debug!(
            provider = self.base.id.as_str(),
            tool_calls = completion.tool_calls.len(),
            "Received response from OpenAI-compatible provider"
        );
        Ok(completion)
    }
}

fn into_completion(provider: &str, response: OpenAIResponse) -> Result<CompletionResponse, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::invalid_response(provider, "missing choices"))?;
    let message = choice
        .message
        .ok_or_else(|| ModelError::invalid_response(provider, "missing message"))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let input = parse_arguments(&call.function.arguments).map_err(|err| {
                ModelError::invalid_response(
                    provider,
                    format!("arguments for '{}' are not JSON: {err}", call.function.name),
                )
            })?;
            let id = if call.id.is_empty() {
                format!("call_{}", Uuid::new_v4().simple())
            } else {
                call.id
            };
            Ok(ToolCall::new(id, call.function.name, input))
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    let stop_reason = if tool_calls.is_empty() {
        StopReason::from_finish_reason(choice.finish_reason.as_deref())
    } else {
        StopReason::ToolUse
    };
    Ok(CompletionResponse {
        content: message.content.unwrap_or_default(),
        tool_calls,
        stop_reason,
    })
}

fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Deserialize)]
struct OpenAIToolCall {
    #[serde(default)]
    id: String,
    function: OpenAIFunction,
}

#[derive(Deserialize)]
struct OpenAIFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> Result<CompletionResponse, ModelError> {
        let response: OpenAIResponse = serde_json::from_value(value).unwrap();
        into_completion("test", response)
    }

    #[test]
    fn plain_text_reply() {
        let completion = parse(json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(completion, CompletionResponse::text("hello"));
    }

    #[test]
    fn tool_calls_are_decoded() {
        let completion = parse(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "fs__read", "arguments": "{\"path\":\"a\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        assert_eq!(completion.content, "");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_9");
        assert_eq!(completion.tool_calls[0].name, "fs__read");
        assert_eq!(completion.tool_calls[0].input, json!({"path": "a"}));
    }

    #[test]
    fn missing_call_ids_are_generated() {
        let completion = parse(json!({
            "choices": [{"message": {"tool_calls": [{"function": {"name": "a__b", "arguments": ""}}]}}]
        }))
        .unwrap();
        assert!(completion.tool_calls[0].id.starts_with("call_"));
        assert_eq!(completion.tool_calls[0].input, json!({}));
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let err = parse(json!({
            "choices": [{"message": {"tool_calls": [{"id": "c", "function": {"name": "a__b", "arguments": "{oops"}}]}}]
        }))
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse { .. }));
    }

    #[test]
    fn empty_choices_are_rejected() {
        assert!(parse(json!({"choices": []})).is_err());
    }

    #[test]
    fn request_omits_empty_tools_and_unset_budget() {
        let payload = OpenAIRequest {
            model: "m".into(),
            messages: Vec::new(),
            tools: Vec::new(),
            max_tokens: None,
            stream: false,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("max_tokens").is_none());
    }
}
