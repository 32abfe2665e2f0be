use super::errors::RuntimeError;
use super::models::{TurnOutcome, TurnRequest};
use crate::application::guardrails::{
    GuardrailAction, SESSION_ENDED_REASON, check_post_message, check_pre_message,
    escalation_notice, turn_limit_notice,
};
use crate::application::tooling::ToolRegistry;
use crate::config::{GuardrailLimits, RuntimeSettings};
use crate::domain::types::{ChatMessage, MessageRole, SessionStatus, ToolDefinition, ToolResult};
use crate::infrastructure::model::{ChatCompletion, CompletionRequest, CompletionResponse};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one conversational turn: guardrails, chat completion, tool round-trips.
pub struct ConversationRuntime<C: ?Sized = dyn ChatCompletion> {
    chat: Arc<C>,
    registry: Option<Arc<ToolRegistry>>,
    limits: GuardrailLimits,
    settings: RuntimeSettings,
}

impl<C: ChatCompletion + ?Sized> ConversationRuntime<C> {
    pub fn new(chat: Arc<C>, limits: GuardrailLimits, settings: RuntimeSettings) -> Self {
        Self {
            chat,
            registry: None,
            limits,
            settings,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn limits(&self) -> &GuardrailLimits {
        &self.limits
    }

    fn tool_registry(&self) -> Option<&ToolRegistry> {
        self.registry
            .as_deref()
            .filter(|_| self.settings.tools_enabled)
    }

    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnOutcome, RuntimeError> {
        let TurnRequest {
            system_prompt,
            mut session,
            history,
            message,
        } = request;

        let pre = check_pre_message(&self.limits, session.turn_count, session.status);
        if !pre.allowed {
            let reason = pre
                .reason
                .unwrap_or_else(|| SESSION_ENDED_REASON.to_string());
            if pre.action == Some(GuardrailAction::EndSession) {
                session.transition(SessionStatus::Ended);
            }
            info!(
                turn_count = session.turn_count,
                status = session.status.as_str(),
                action = pre.action.map(GuardrailAction::as_str),
                "guardrail blocked message"
            );
            let reply = ChatMessage::system(reason.clone());
            return Ok(TurnOutcome {
                reply: reply.clone(),
                session,
                guardrail_notice: Some(reason),
                tool_results: Vec::new(),
                transcript: vec![reply],
            });
        }

        if message.trim().is_empty() {
            return Err(RuntimeError::EmptyMessage);
        }

        let mut messages = window_history(history, self.settings.history_window);
        let user = ChatMessage::user(message);
        messages.push(user.clone());
        let mut transcript = vec![user];

        let (tools, system_prompt) = self.prepare_tools(system_prompt).await;
        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut rounds = 0;
        let mut response = self
            .complete(&system_prompt, &messages, tools.clone())
            .await?;

        while response.requests_tools() {
            let Some(registry) = self.tool_registry() else {
                warn!("model requested tools while tool use is disabled; ignoring the calls");
                break;
            };
            if rounds >= self.settings.max_tool_rounds {
                warn!(
                    rounds,
                    "tool round limit reached; requesting a final answer without tools"
                );
                response = self.complete(&system_prompt, &messages, Vec::new()).await?;
                break;
            }
            rounds += 1;

            let calls = response.tool_calls;
            debug!(round = rounds, calls = calls.len(), "dispatching tool calls");
            let assistant = ChatMessage::assistant_with_calls(response.content, calls.clone());
            messages.push(assistant.clone());
            transcript.push(assistant);

            let results = join_all(calls.iter().map(|call| registry.execute_tool(call))).await;
            for result in &results {
                let message = ChatMessage::tool_result(result);
                messages.push(message.clone());
                transcript.push(message);
            }
            tool_results.extend(results);

            response = self
                .complete(&system_prompt, &messages, tools.clone())
                .await?;
        }

        let reply = ChatMessage::assistant(response.content);
        transcript.push(reply.clone());

        let unproductive = reply.content.trim().is_empty()
            || (!tool_results.is_empty() && tool_results.iter().all(|result| result.is_error));
        session.failed_attempts = if unproductive {
            session.failed_attempts.saturating_add(1)
        } else {
            0
        };
        session.turn_count = session.turn_count.saturating_add(1);

        let post = check_post_message(&self.limits, session.failed_attempts);
        let guardrail_notice = if post.should_escalate {
            session.transition(SessionStatus::Escalated);
            Some(escalation_notice(&self.limits))
        } else if session.turn_count >= self.limits.max_turns_per_session {
            session.transition(SessionStatus::Ended);
            Some(turn_limit_notice(&self.limits))
        } else {
            None
        };

        info!(
            turn_count = session.turn_count,
            failed_attempts = session.failed_attempts,
            status = session.status.as_str(),
            tool_calls = tool_results.len(),
            "turn processed"
        );
        Ok(TurnOutcome {
            reply,
            session,
            guardrail_notice,
            tool_results,
            transcript,
        })
    }

    async fn prepare_tools(&self, system_prompt: String) -> (Vec<ToolDefinition>, String) {
        let Some(registry) = self.tool_registry() else {
            return (Vec::new(), system_prompt);
        };
        let tools = registry.tool_definitions().await;
        let guidance = registry.server_instructions().await;
        (tools, compose_system_prompt(system_prompt, &guidance))
    }

    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: Vec<ToolDefinition>,
    ) -> Result<CompletionResponse, RuntimeError> {
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            tools,
            max_tokens: self.limits.max_response_length,
        };
        Ok(self.chat.complete(request).await?)
    }
}

/// Keeps the most recent `window` messages.
///
/// Leading tool results whose originating assistant message fell outside the
/// window are dropped as well.
pub fn window_history(history: Vec<ChatMessage>, window: usize) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(window);
    history
        .into_iter()
        .skip(start)
        .skip_while(|message| message.role == MessageRole::Tool)
        .collect()
}

/// Appends each server's `initialize` instructions to the base prompt.
pub fn compose_system_prompt(base: String, guidance: &[(String, String)]) -> String {
    if guidance.is_empty() {
        return base;
    }
    let mut prompt = base;
    if !prompt.trim().is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str("Tool server guidance:");
    for (server, text) in guidance {
        prompt.push_str(&format!("\n\n[{server}]\n{text}"));
    }
    prompt
}

