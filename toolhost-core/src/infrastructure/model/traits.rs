//! Model traits

use super::types::{CompletionRequest, CompletionResponse, ModelError};
use async_trait::async_trait;

/// A chat service able to answer with text or with tool requests.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Provider identifier used in logs and error messages.
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError>;
}
