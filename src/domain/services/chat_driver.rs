#[cfg(test)]
#[path = "chat_driver_test.rs"]
mod tests;

use super::reasoning::strip_reasoning;
use crate::domain::models::help_text;
use crate::domain::models::ChatConsole;
use crate::domain::models::ChatError;
use crate::domain::models::ChatSession;
use crate::domain::models::ChatTransport;
use crate::domain::models::ConversationTurn;
use crate::domain::models::SlashCommand;

fn console_error(err: anyhow::Error) -> ChatError {
    return ChatError::Console(err.to_string());
}

/// Runs the interactive loop until the user quits, input runs out, or a turn
/// fails. A failed turn leaves its user turn in the transcript and ends the
/// session without retrying.
pub async fn run(
    session: &mut ChatSession,
    transport: &(dyn ChatTransport + Send + Sync),
    console: &mut (dyn ChatConsole + Send),
) -> Result<(), ChatError> {
    loop {
        let line = match console.read_line().await.map_err(console_error)? {
            Some(line) => line,
            None => {
                tracing::debug!(turns = session.transcript.len(), "Input exhausted");
                return Ok(());
            }
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(command) = SlashCommand::parse(text) {
            if command.is_quit() {
                return Ok(());
            }
            if command.is_help() {
                console.render_notice(&help_text()).map_err(console_error)?;
                continue;
            }
        }

        session.transcript.push(ConversationTurn::user(text));

        let reply = transport
            .send(&session.model, session.transcript.turns(), &session.params)
            .await?;
        if let Some(usage) = reply.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total(),
                "Chat turn completed"
            );
        }

        let display = strip_reasoning(&reply.turn.content);
        session.transcript.push(reply.turn);
        console
            .render_reply(&session.model, &display)
            .map_err(console_error)?;
    }
}
