use super::defaults::{DEFAULT_ESCALATION_THRESHOLD, DEFAULT_MAX_TURNS_PER_SESSION};
use serde::{Deserialize, Serialize};

/// Per-deployment resource limits evaluated around every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailLimits {
    pub max_turns_per_session: u32,
    pub escalation_threshold: u32,
    /// Token budget for one completion. Unrelated to the character limits used elsewhere.
    pub max_response_length: Option<u32>,
}

impl Default for GuardrailLimits {
    fn default() -> Self {
        Self {
            max_turns_per_session: DEFAULT_MAX_TURNS_PER_SESSION,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            max_response_length: None,
        }
    }
}

impl GuardrailLimits {
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns_per_session = max_turns;
        self
    }

    pub fn with_escalation_threshold(mut self, threshold: u32) -> Self {
        self.escalation_threshold = threshold;
        self
    }
}
