pub const DEFAULT_CONFIG_PATH: &str = "config/deployment.toml";
pub const DEFAULT_ENV_PATH: &str = "config/.env";

pub const DEFAULT_MAX_EXECUTION_MS: u64 = 30_000;
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 102_400;

pub const DEFAULT_MAX_TURNS_PER_SESSION: u32 = 50;
pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 4;
/// 20 conversational turns.
pub const DEFAULT_HISTORY_WINDOW: usize = 40;

pub const DEFAULT_OPENAI_API_PATH: &str = "/v1/chat/completions";
