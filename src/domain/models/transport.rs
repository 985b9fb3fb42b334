use async_trait::async_trait;

use super::ChatError;
use super::ChatParams;
use super::ChatReply;
use super::ConversationTurn;

pub type ChatTransportBox = Box<dyn ChatTransport + Send + Sync>;

#[async_trait]
pub trait ChatTransport {
    /// Sends the whole transcript to the backend and returns its reply. The
    /// backends are stateless, so every call replays the full history.
    async fn send(
        &self,
        model: &str,
        turns: &[ConversationTurn],
        params: &ChatParams,
    ) -> Result<ChatReply, ChatError>;
}
