//! # Application Module
//!
//! Core logic of the tool host.
//!
//! ## Submodules
//!
//! - [`tooling`] - Tool-server connections and the namespaced tool registry
//! - [`guardrails`] - Pre- and post-turn session limits
//! - [`conversation`] - The per-turn conversation runtime

pub mod conversation;
pub mod guardrails;
pub mod tooling;
