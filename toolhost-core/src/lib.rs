//! Tool-execution runtime for LLM agents.
//!
//! Connects to independent tool servers over stdio, SSE or streamable HTTP,
//! aggregates their tools into one namespaced catalog, and drives
//! guardrailed conversation turns against an external chat service.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{conversation, guardrails, tooling};
pub use config::{ConfigError, DeploymentConfig};
pub use domain::types;
pub use infrastructure::model;
