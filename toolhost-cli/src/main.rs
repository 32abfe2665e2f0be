mod chat;
mod cli;

use clap::Parser;
use cli::{Cli, Command};
use serde_json::{Value, json};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use toolhost_core::DeploymentConfig;
use toolhost_core::conversation::ConversationRuntime;
use toolhost_core::model::ProviderFactory;
use toolhost_core::tooling::{ConnectReport, ToolRegistry};
use toolhost_core::types::ToolCall;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    debug!(command = ?cli.command, config = ?cli.config, "CLI arguments parsed");

    let config = DeploymentConfig::load(cli.config.as_deref())?;
    info!(
        servers = config.servers.len(),
        tools_enabled = config.runtime.tools_enabled,
        "Loaded deployment configuration"
    );

    let registry = Arc::new(
        ToolRegistry::new().with_handshake_timeout(Duration::from_millis(cli.handshake_timeout_ms)),
    );
    let report = registry.connect(&config.servers).await;

    let outcome = run_command(cli.command, &config, &registry, &report).await;
    registry.disconnect().await;
    outcome
}

async fn run_command(
    command: Command,
    config: &DeploymentConfig,
    registry: &Arc<ToolRegistry>,
    report: &ConnectReport,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Inspect => {
            let tools = registry.list_tools().await;
            let instructions: Vec<Value> = registry
                .server_instructions()
                .await
                .into_iter()
                .map(|(server, text)| json!({ "server": server, "instructions": text }))
                .collect();
            let output = json!({
                "connected": report.connected,
                "failed": report
                    .failed
                    .iter()
                    .map(|failure| json!({ "server": failure.server, "reason": failure.reason }))
                    .collect::<Vec<_>>(),
                "skipped": report.skipped,
                "instructions": instructions,
                "tools": tools
                    .iter()
                    .map(|tool| json!({
                        "name": tool.qualified_name(),
                        "description": tool.description,
                        "inputSchema": tool.input_schema,
                    }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Call {
            tool,
            input,
            server,
        } => {
            let input: Value = serde_json::from_str(&input)?;
            let mut call = ToolCall::new(format!("cli-{}", Uuid::new_v4().simple()), tool, input);
            if let Some(server) = server {
                call = call.on_server(server);
            }
            info!(tool = call.name.as_str(), "Executing tool call from CLI");
            let result = registry.execute_tool(&call).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Chat { system } => {
            let provider = config.require_provider()?;
            let runtime = ConversationRuntime::new(
                ProviderFactory::create(provider),
                config.guardrails,
                config.runtime,
            )
            .with_registry(Arc::clone(registry));
            chat::run(&runtime, system.unwrap_or_default()).await?;
        }
    }
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
