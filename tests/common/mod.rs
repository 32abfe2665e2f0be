// Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use toolhost_core::config::{SandboxPolicy, ServerDefinition, TransportConfig};

pub const MOCK_SERVER: &str = env!("CARGO_BIN_EXE_mock-tool-server");

pub fn mock_server(name: &str) -> ServerDefinition {
    mock_server_with_env(name, &[])
}

pub fn mock_server_with_env(name: &str, vars: &[(&str, &str)]) -> ServerDefinition {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    ServerDefinition::new(
        name,
        TransportConfig::Stdio {
            command: MOCK_SERVER.into(),
            args: Vec::new(),
            env,
            workdir: None,
        },
    )
}

pub fn sandbox(max_execution_ms: u64, max_output_size: usize) -> SandboxPolicy {
    SandboxPolicy {
        max_execution_ms,
        max_output_size,
        ..SandboxPolicy::default()
    }
}
