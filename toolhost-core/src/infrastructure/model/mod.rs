//! Chat-completion infrastructure
//!
//! # Structure
//! - `types` - Request, response and error types
//! - `traits` - The `ChatCompletion` seam used by the conversation runtime
//! - `adapter` - Message and tool format adapters
//! - `factory` - Builds a client from provider config
//! - `clients` - Concrete HTTP clients

pub mod adapter;
pub mod clients;
pub mod factory;
pub mod traits;
pub mod types;

pub use factory::ProviderFactory;
pub use traits::ChatCompletion;
pub use types::{CompletionRequest, CompletionResponse, ModelError, StopReason};
