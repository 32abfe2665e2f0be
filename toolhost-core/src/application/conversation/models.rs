use crate::domain::types::{ChatMessage, SessionState, ToolResult};

/// Input of one conversational turn. Session state is owned by the caller between turns.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub system_prompt: String,
    pub session: SessionState,
    pub history: Vec<ChatMessage>,
    pub message: String,
}

impl TurnRequest {
    pub fn new(session: SessionState, message: impl Into<String>) -> Self {
        Self {
            system_prompt: String::new(),
            session,
            history: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant answer, or a system-authored notice when a guardrail blocked the turn.
    pub reply: ChatMessage,
    pub session: SessionState,
    /// Shown to the user when the turn ended or escalated the session.
    pub guardrail_notice: Option<String>,
    pub tool_results: Vec<ToolResult>,
    /// Messages produced by this turn, in order, for the caller to append to history.
    pub transcript: Vec<ChatMessage>,
}
