#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use std::fmt;

use serde::Deserializer;
use serde_derive::Deserialize;
use serde_derive::Serialize;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 512;

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let val: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    return Ok(val.unwrap_or_default());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Backends disagree on the shape of tool calls, so they are carried
    /// through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: &str) -> ConversationTurn {
        return ConversationTurn {
            role,
            content: content.to_string(),
            tool_calls: None,
        };
    }

    pub fn user(content: &str) -> ConversationTurn {
        return ConversationTurn::new(Role::User, content);
    }

    pub fn assistant(content: &str) -> ConversationTurn {
        return ConversationTurn::new(Role::Assistant, content);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        return self.prompt_tokens.saturating_add(self.completion_tokens);
    }
}

/// A backend reply normalized to the canonical conversation model.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatReply {
    pub turn: ConversationTurn,
    pub usage: Option<TokenUsage>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatParamsError {
    Temperature(String),
    MaxTokens(String),
    Stream(String),
}

impl fmt::Display for ChatParamsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChatParamsError::Temperature(val) => {
                return write!(f, "Invalid temperature {val}, expected a number between 0.0 and 2.0")
            }
            ChatParamsError::MaxTokens(val) => {
                return write!(f, "Invalid max tokens {val}, expected a whole number of at least 1")
            }
            ChatParamsError::Stream(val) => {
                return write!(f, "Invalid stream value {val}, expected true or false")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChatParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for ChatParams {
    fn default() -> ChatParams {
        return ChatParams {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: false,
        };
    }
}

impl ChatParams {
    pub fn parse_temperature(text: &str) -> Result<f32, ChatParamsError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(DEFAULT_TEMPERATURE);
        }

        match trimmed.parse::<f32>() {
            Ok(val) if (0.0..=2.0).contains(&val) => return Ok(val),
            _ => return Err(ChatParamsError::Temperature(trimmed.to_string())),
        }
    }

    pub fn parse_max_tokens(text: &str) -> Result<u32, ChatParamsError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(DEFAULT_MAX_TOKENS);
        }

        match trimmed.parse::<u32>() {
            Ok(val) if val >= 1 => return Ok(val),
            _ => return Err(ChatParamsError::MaxTokens(trimmed.to_string())),
        }
    }

    pub fn parse_stream(text: &str) -> Result<bool, ChatParamsError> {
        match text.trim().to_lowercase().as_str() {
            "" | "false" | "n" | "no" => return Ok(false),
            "true" | "y" | "yes" => return Ok(true),
            other => return Err(ChatParamsError::Stream(other.to_string())),
        }
    }
}

/// Ordered conversation history. Turns can only be appended, there is no way
/// to reach one mutably once it is stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        return &self.turns;
    }

    pub fn len(&self) -> usize {
        return self.turns.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.turns.is_empty();
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        return self.turns.last();
    }
}

pub struct ChatSession {
    pub model: String,
    pub params: ChatParams,
    pub transcript: Transcript,
}

impl ChatSession {
    pub fn new(model: &str, params: ChatParams) -> ChatSession {
        return ChatSession {
            model: model.to_string(),
            params,
            transcript: Transcript::default(),
        };
    }
}
