#[cfg(test)]
#[path = "ollama_test.rs"]
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

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ConversationTurn>,
    stream: bool,
    options: Options,
}

impl ChatRequest {
    pub fn new(model: &str, turns: &[ConversationTurn], params: &ChatParams) -> ChatRequest {
        return ChatRequest {
            model: model.to_string(),
            messages: turns.to_vec(),
            stream: params.stream,
            options: Options {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    message: ConversationTurn,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl ChatResponse {
    pub fn normalize(self) -> ChatReply {
        let mut turn = self.message;
        turn.role = Role::Assistant;

        let usage = match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage {
                prompt_tokens: prompt.unwrap_or_default(),
                completion_tokens: completion.unwrap_or_default(),
            }),
        };

        return ChatReply { turn, usage };
    }
}

/// Folds newline-delimited JSON frames into one response. The frame marked
/// `done` carries the token counts.
pub fn collect_stream(lines: &[String]) -> Result<ChatResponse, ChatError> {
    let mut content = "".to_string();
    let mut last: Option<ChatResponse> = None;

    for line in lines {
        let cleaned_line = line.trim();
        if cleaned_line.is_empty() {
            continue;
        }

        let frame: ChatResponse = serde_json::from_str(cleaned_line)
            .map_err(|err| return decode_err(BackendKind::Ollama, err))?;
        content += &frame.message.content;
        let done = frame.done;
        last = Some(frame);
        if done {
            break;
        }
    }

    let mut res = match last {
        Some(res) => res,
        None => {
            return Err(ChatError::TransportError(
                "Stream from ollama ended without any frames".to_string(),
            ))
        }
    };
    res.message.content = content;

    return Ok(res);
}
