use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use toolhost_core::conversation::{ConversationRuntime, TurnRequest};
use toolhost_core::model::ChatCompletion;
use toolhost_core::types::{ChatMessage, SessionState};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ChatLoopError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum LoopControl {
    Continue,
    Exit,
}

/// In-memory session owned by the chat loop between turns.
#[derive(Default)]
struct ChatSession {
    state: SessionState,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

pub async fn run<C>(runtime: &ConversationRuntime<C>, system_prompt: String) -> Result<(), ChatLoopError>
where
    C: ChatCompletion + ?Sized,
{
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut session = ChatSession::default();

    write_line(
        &mut stdout,
        "toolhost chat. Commands: /reset, /status, /exit",
    )
    .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            write_line(&mut stdout, "").await?;
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let control = match input {
            "/exit" | "/quit" => LoopControl::Exit,
            "/reset" => {
                session.reset();
                write_line(&mut stdout, "Session reset.").await?;
                LoopControl::Continue
            }
            "/status" => {
                let status = format!(
                    "turns: {} | failed attempts: {} | status: {}",
                    session.state.turn_count,
                    session.state.failed_attempts,
                    session.state.status.as_str()
                );
                write_line(&mut stdout, &status).await?;
                LoopControl::Continue
            }
            message => {
                handle_message(runtime, &system_prompt, &mut session, message, &mut stdout).await?;
                LoopControl::Continue
            }
        };
        if matches!(control, LoopControl::Exit) {
            break;
        }
    }

    info!(turns = session.state.turn_count, "chat loop finished");
    Ok(())
}

async fn handle_message<C>(
    runtime: &ConversationRuntime<C>,
    system_prompt: &str,
    session: &mut ChatSession,
    message: &str,
    stdout: &mut Stdout,
) -> Result<(), ChatLoopError>
where
    C: ChatCompletion + ?Sized,
{
    let request = TurnRequest::new(session.state, message)
        .with_system_prompt(system_prompt)
        .with_history(session.history.clone());
    match runtime.process_turn(request).await {
        Ok(outcome) => {
            for result in &outcome.tool_results {
                let marker = if result.is_error { "failed" } else { "ok" };
                let line = format!("  [tool {} {marker} in {}ms]", result.call_id, result.elapsed_ms);
                write_line(stdout, &line).await?;
            }
            write_line(stdout, &outcome.reply.content).await?;
            if let Some(notice) = &outcome.guardrail_notice {
                write_line(stdout, &format!("[{notice}]")).await?;
            }
            session.state = outcome.session;
            session.history.extend(outcome.transcript);
        }
        Err(err) => {
            warn!(%err, "turn failed");
            write_line(stdout, &format!("error: {}", err.user_message())).await?;
        }
    }
    Ok(())
}

async fn write_line(stdout: &mut Stdout, text: &str) -> Result<(), ChatLoopError> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
