use anyhow::Result;
use async_trait::async_trait;

/// The terminal side of a chat session: where user lines come from and where
/// replies go.
#[async_trait]
pub trait ChatConsole {
    /// Waits for the next line of user input. `None` means the input source
    /// is exhausted.
    async fn read_line(&mut self) -> Result<Option<String>>;

    /// Shows an assistant reply, already stripped of reasoning markers.
    fn render_reply(&mut self, model: &str, text: &str) -> Result<()>;

    /// Shows a message that does not belong to the conversation itself.
    fn render_notice(&mut self, text: &str) -> Result<()>;
}
