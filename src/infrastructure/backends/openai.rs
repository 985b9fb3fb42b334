#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::decode_err;
use crate::domain::models::BackendKind;
use crate::domain::models::ChatError;
use crate::domain::models::ChatParams;
use crate::domain::models::ChatReply;
use crate::domain::models::ConversationTurn;
use crate::domain::models::Role;
use crate::domain::models::TokenUsage;

const DONE_MARKER: &str = "[DONE]";

/// Body of `POST /v1/chat/completions`. mlx_lm serves the model it was
/// launched with, so no model name is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    messages: Vec<ConversationTurn>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl ChatRequest {
    pub fn new(turns: &[ConversationTurn], params: &ChatParams) -> ChatRequest {
        return ChatRequest {
            messages: turns.to_vec(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: params.stream,
        };
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Choice {
    message: ConversationTurn,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ChatResponse {
    /// Keeps the first choice as the assistant turn.
    pub fn normalize(self) -> Result<ChatReply, ChatError> {
        let choice = match self.choices.into_iter().next() {
            Some(choice) => choice,
            None => {
                return Err(ChatError::TransportError(
                    "Response from mlx_lm contained no choices".to_string(),
                ))
            }
        };

        let mut turn = choice.message;
        turn.role = Role::Assistant;

        return Ok(ChatReply {
            turn,
            usage: self.usage.map(|usage| {
                return TokenUsage {
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                };
            }),
        });
    }
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

/// Folds server-sent `data:` events into one response, stopping at `[DONE]`.
pub fn collect_stream(lines: &[String]) -> Result<ChatResponse, ChatError> {
    let mut content = "".to_string();
    let mut usage = None;
    let mut chunks = 0;

    for line in lines {
        let mut cleaned_line = line.trim();
        if let Some(data) = cleaned_line.strip_prefix("data:") {
            cleaned_line = data.trim();
        }
        if cleaned_line.is_empty() {
            continue;
        }
        if cleaned_line == DONE_MARKER {
            break;
        }

        let chunk: StreamChunk = serde_json::from_str(cleaned_line)
            .map_err(|err| return decode_err(BackendKind::MlxLm, err))?;
        chunks += 1;
        if let Some(text) = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| return choice.delta.content)
        {
            content += &text;
        }
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
    }

    if chunks == 0 {
        return Err(ChatError::TransportError(
            "Stream from mlx_lm ended without any data".to_string(),
        ));
    }

    return Ok(ChatResponse {
        choices: vec![Choice {
            message: ConversationTurn::assistant(&content),
        }],
        usage,
    });
}
