pub mod app;
pub mod defaults;
pub mod error;
pub mod guardrails;
pub mod loader;
pub mod provider;
pub mod runtime;
pub mod server;

pub use app::DeploymentConfig;
pub use error::ConfigError;
pub use guardrails::GuardrailLimits;
pub use provider::ProviderConfig;
pub use runtime::RuntimeSettings;
pub use server::{SandboxPolicy, ServerDefinition, ServerStatus, TransportConfig, TransportKind};
