use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "toolhost",
    version,
    about = "Connect to tool servers, inspect their catalogs and chat through them"
)]
pub struct Cli {
    /// Deployment configuration file (defaults to config/deployment.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Bound on connecting to and listing tools of each server
    #[arg(long, global = true, default_value_t = 30_000)]
    pub handshake_timeout_ms: u64,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to every active server and print the filtered tool catalog
    Inspect,
    /// Execute a single tool call and print the result as JSON
    Call {
        /// Namespaced tool name, e.g. `files__fs_read`
        tool: String,
        /// Tool input as a JSON object
        #[arg(long, default_value = "{}")]
        input: String,
        /// Target server when `tool` is not namespaced
        #[arg(long)]
        server: Option<String>,
    },
    /// Interactive chat over stdin
    Chat {
        #[arg(long)]
        system: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_with_input() {
        let cli = Cli::parse_from([
            "toolhost",
            "--config",
            "deploy.toml",
            "call",
            "files__fs_read",
            "--input",
            r#"{"path":"/tmp"}"#,
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("deploy.toml")));
        match cli.command {
            Command::Call { tool, input, server } => {
                assert_eq!(tool, "files__fs_read");
                assert_eq!(input, r#"{"path":"/tmp"}"#);
                assert_eq!(server, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn handshake_timeout_defaults_to_thirty_seconds() {
        let cli = Cli::parse_from(["toolhost", "inspect"]);
        assert_eq!(cli.handshake_timeout_ms, 30_000);
        assert!(matches!(cli.command, Command::Inspect));
    }
}
