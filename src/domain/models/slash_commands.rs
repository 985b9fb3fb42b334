#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let prefix = text.split_whitespace().next()?;
        let cmd = SlashCommand {
            command: prefix.to_string(),
        };
        if cmd.is_quit() || cmd.is_help() {
            return Some(cmd);
        }

        return None;
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }
}

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /exit /quit (/q) - End the chat session. A backend started for this session is stopped.
- /help (/h) - Provides this help menu.

Every message is sent together with the whole conversation so far, local backends keep no history of their own.
        "#;

    return text.trim().to_string();
}
