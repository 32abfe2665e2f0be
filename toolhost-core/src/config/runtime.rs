use super::defaults::{DEFAULT_HISTORY_WINDOW, DEFAULT_MAX_TOOL_ROUNDS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub tools_enabled: bool,
    /// Upper bound on tool round-trips inside a single turn.
    pub max_tool_rounds: u32,
    /// Number of most recent history messages sent with each turn.
    pub history_window: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tools_enabled: true,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}
