use crate::infrastructure::model::ModelError;
use thiserror::Error;

/// Failures that abort a turn. Tool-server failures never appear here.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("user message is empty")]
    EmptyMessage,
}

impl RuntimeError {
    pub fn user_message(&self) -> String {
        match self {
            RuntimeError::Model(err) => err.user_message(),
            RuntimeError::EmptyMessage => "Please type a message first.".to_string(),
        }
    }
}
