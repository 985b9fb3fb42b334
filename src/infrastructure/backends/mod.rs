#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use serde_derive::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::domain::models::BackendKind;
use crate::domain::models::ChatError;
use crate::domain::models::ChatParams;
use crate::domain::models::ChatReply;
use crate::domain::models::ChatTransport;
use crate::domain::models::ConversationTurn;

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

fn transport_err(err: impl std::fmt::Display) -> ChatError {
    return ChatError::TransportError(err.to_string());
}

pub(crate) fn decode_err(kind: BackendKind, err: serde_json::Error) -> ChatError {
    return ChatError::TransportError(format!("Failed to decode {kind} response: {err}"));
}

/// Request bodies of the supported wire schemas.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireRequest {
    OpenAi(openai::ChatRequest),
    Ollama(ollama::ChatRequest),
}

impl WireRequest {
    pub fn new(kind: BackendKind, model: &str, turns: &[ConversationTurn], params: &ChatParams) -> WireRequest {
        match kind {
            BackendKind::MlxLm => return WireRequest::OpenAi(openai::ChatRequest::new(turns, params)),
            BackendKind::Ollama => {
                return WireRequest::Ollama(ollama::ChatRequest::new(model, turns, params))
            }
        }
    }
}

/// Response bodies of the supported wire schemas. Streamed responses are
/// folded into the same shape as a single response.
#[derive(Debug, Clone, PartialEq)]
pub enum WireResponse {
    OpenAi(openai::ChatResponse),
    Ollama(ollama::ChatResponse),
}

impl WireResponse {
    pub fn decode(kind: BackendKind, body: &str) -> Result<WireResponse, ChatError> {
        match kind {
            BackendKind::MlxLm => {
                let res = serde_json::from_str(body).map_err(|err| return decode_err(kind, err))?;
                return Ok(WireResponse::OpenAi(res));
            }
            BackendKind::Ollama => {
                let res = serde_json::from_str(body).map_err(|err| return decode_err(kind, err))?;
                return Ok(WireResponse::Ollama(res));
            }
        }
    }

    pub fn collect_stream(kind: BackendKind, lines: &[String]) -> Result<WireResponse, ChatError> {
        match kind {
            BackendKind::MlxLm => return Ok(WireResponse::OpenAi(openai::collect_stream(lines)?)),
            BackendKind::Ollama => return Ok(WireResponse::Ollama(ollama::collect_stream(lines)?)),
        }
    }

    pub fn normalize(self) -> Result<ChatReply, ChatError> {
        match self {
            WireResponse::OpenAi(res) => return res.normalize(),
            WireResponse::Ollama(res) => return Ok(res.normalize()),
        }
    }
}

/// Talks to a local backend over HTTP using the wire schema of its kind.
pub struct HttpTransport {
    kind: BackendKind,
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(kind: BackendKind, base_url: &str) -> HttpTransport {
        return HttpTransport {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        };
    }

    async fn read_lines(res: reqwest::Response) -> Result<Vec<String>, ChatError> {
        let stream = res.bytes_stream().map_err(convert_err);
        let mut lines_reader = StreamReader::new(stream).lines();

        let mut lines = vec![];
        while let Some(line) = lines_reader.next_line().await.map_err(transport_err)? {
            lines.push(line);
        }

        return Ok(lines);
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    #[allow(clippy::implicit_return)]
    async fn send(
        &self,
        model: &str,
        turns: &[ConversationTurn],
        params: &ChatParams,
    ) -> Result<ChatReply, ChatError> {
        let url = format!("{}{}", self.base_url, self.kind.chat_path());
        let req = WireRequest::new(self.kind, model, turns, params);
        tracing::debug!(url, turns = turns.len(), stream = params.stream, "Sending chat request");

        let res = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(transport_err)?;

        let status = res.status().as_u16();
        if !res.status().is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!(
                status,
                body,
                backend = self.kind.to_string(),
                "Failed to make chat request"
            );
            return Err(ChatError::BackendError { status, body });
        }

        let wire = if params.stream {
            let lines = HttpTransport::read_lines(res).await?;
            WireResponse::collect_stream(self.kind, &lines)?
        } else {
            let body = res.text().await.map_err(transport_err)?;
            WireResponse::decode(self.kind, &body)?
        };
        tracing::debug!(body = ?wire, "Chat response");

        return wire.normalize();
    }
}
