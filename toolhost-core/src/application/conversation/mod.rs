mod errors;
mod models;
mod runtime;


pub use errors::RuntimeError;
pub use models::{TurnOutcome, TurnRequest};
pub use runtime::{ConversationRuntime, compose_system_prompt, window_history};
