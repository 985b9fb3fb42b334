use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use test_utils::openai_chat_fixture;

use super::run;
use crate::domain::models::BackendKind;
use crate::domain::models::ChatConsole;
use crate::domain::models::ChatError;
use crate::domain::models::ChatParams;
use crate::domain::models::ChatReply;
use crate::domain::models::ChatSession;
use crate::domain::models::ChatTransport;
use crate::domain::models::ConversationTurn;
use crate::domain::models::Role;
use crate::infrastructure::backends::HttpTransport;

struct ScriptedConsole {
    lines: VecDeque<String>,
    replies: Vec<String>,
    notices: Vec<String>,
}

impl ScriptedConsole {
    fn new(lines: &[&str]) -> ScriptedConsole {
        return ScriptedConsole {
            lines: lines.iter().map(|line| return line.to_string()).collect(),
            replies: vec![],
            notices: vec![],
        };
    }
}

#[async_trait]
impl ChatConsole for ScriptedConsole {
    async fn read_line(&mut self) -> Result<Option<String>> {
        return Ok(self.lines.pop_front());
    }

    fn render_reply(&mut self, _model: &str, text: &str) -> Result<()> {
        self.replies.push(text.to_string());
        return Ok(());
    }

    fn render_notice(&mut self, text: &str) -> Result<()> {
        self.notices.push(text.to_string());
        return Ok(());
    }
}

/// Answers with a fixed reply, or fails every call, and remembers how many
/// turns each request carried.
struct FakeTransport {
    reply: Result<String, ChatError>,
    requests: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl FakeTransport {
    fn replying(text: &str) -> FakeTransport {
        return FakeTransport {
            reply: Ok(text.to_string()),
            requests: Mutex::new(vec![]),
        };
    }

    fn failing(err: ChatError) -> FakeTransport {
        return FakeTransport {
            reply: Err(err),
            requests: Mutex::new(vec![]),
        };
    }

    fn request_sizes(&self) -> Vec<usize> {
        return self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|turns| return turns.len())
            .collect();
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send(
        &self,
        _model: &str,
        turns: &[ConversationTurn],
        _params: &ChatParams,
    ) -> Result<ChatReply, ChatError> {
        self.requests.lock().unwrap().push(turns.to_vec());
        let text = self.reply.clone()?;

        return Ok(ChatReply {
            turn: ConversationTurn::assistant(&text),
            usage: None,
        });
    }
}

#[tokio::test]
async fn it_alternates_user_and_assistant_turns() -> Result<()> {
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let transport = FakeTransport::replying("Sure.");
    let mut console = ScriptedConsole::new(&["one", "two", "three", "/exit"]);

    run(&mut session, &transport, &mut console).await?;

    let turns = session.transcript.turns();
    assert_eq!(turns.len(), 6);
    for (idx, turn) in turns.iter().enumerate() {
        let expected = if idx % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(turn.role, expected);
    }
    assert_eq!(turns[0].content, "one");
    assert_eq!(turns[2].content, "two");
    assert_eq!(turns[4].content, "three");
    assert_eq!(console.replies, vec!["Sure.", "Sure.", "Sure."]);

    return Ok(());
}

#[tokio::test]
async fn it_replays_the_whole_transcript_on_every_turn() -> Result<()> {
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let transport = FakeTransport::replying("Ok.");
    let mut console = ScriptedConsole::new(&["a", "b", "c"]);

    run(&mut session, &transport, &mut console).await?;

    assert_eq!(transport.request_sizes(), vec![1, 3, 5]);

    return Ok(());
}

#[tokio::test]
async fn it_strips_reasoning_for_display_only() -> Result<()> {
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let transport = FakeTransport::replying("<think>plan</think>\n\nHello!");
    let mut console = ScriptedConsole::new(&["hi"]);

    run(&mut session, &transport, &mut console).await?;

    assert_eq!(console.replies, vec!["Hello!"]);
    assert_eq!(
        session.transcript.last().unwrap().content,
        "<think>plan</think>\n\nHello!"
    );

    return Ok(());
}

#[tokio::test]
async fn it_ends_without_sending_when_input_is_exhausted() -> Result<()> {
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let transport = FakeTransport::replying("unused");
    let mut console = ScriptedConsole::new(&[]);

    run(&mut session, &transport, &mut console).await?;

    assert!(session.transcript.is_empty());
    assert!(transport.request_sizes().is_empty());

    return Ok(());
}

#[tokio::test]
async fn it_skips_blank_lines_and_answers_help_locally() -> Result<()> {
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let transport = FakeTransport::replying("unused");
    let mut console = ScriptedConsole::new(&["", "   ", "/help", "/q", "never read"]);

    run(&mut session, &transport, &mut console).await?;

    assert!(session.transcript.is_empty());
    assert!(transport.request_sizes().is_empty());
    assert_eq!(console.notices.len(), 1);
    assert!(console.notices[0].starts_with("COMMANDS:"));
    assert_eq!(console.lines, vec!["never read".to_string()]);

    return Ok(());
}

#[tokio::test]
async fn it_stops_at_the_first_transport_failure() {
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let transport = FakeTransport::failing(ChatError::TransportError("connection refused".to_string()));
    let mut console = ScriptedConsole::new(&["hi", "still there?"]);

    let res = run(&mut session, &transport, &mut console).await;

    assert_eq!(
        res,
        Err(ChatError::TransportError("connection refused".to_string()))
    );
    assert_eq!(transport.request_sizes(), vec![1]);
    assert_eq!(session.transcript.len(), 1);
    assert_eq!(session.transcript.last().unwrap().role, Role::User);
    assert!(console.replies.is_empty());
}

#[tokio::test]
async fn it_surfaces_backend_errors_without_an_assistant_turn() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .with_body("overloaded")
        .expect(1)
        .create_async()
        .await;

    let transport = HttpTransport::new(BackendKind::MlxLm, &server.url());
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let mut console = ScriptedConsole::new(&["hello", "again"]);

    let res = run(&mut session, &transport, &mut console).await;

    assert_eq!(
        res,
        Err(ChatError::BackendError {
            status: 500,
            body: "overloaded".to_string()
        })
    );
    assert_eq!(session.transcript.len(), 1);
    assert_eq!(session.transcript.last().unwrap().role, Role::User);
    mock.assert_async().await;
}

#[tokio::test]
async fn it_drives_a_turn_against_an_http_backend() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(openai_chat_fixture())
        .create_async()
        .await;

    let transport = HttpTransport::new(BackendKind::MlxLm, &server.url());
    let mut session = ChatSession::new("qwen", ChatParams::default());
    let mut console = ScriptedConsole::new(&["hello", "/exit"]);

    run(&mut session, &transport, &mut console).await?;

    assert_eq!(session.transcript.len(), 2);
    assert_eq!(console.replies, vec!["Hello there!"]);

    return Ok(());
}
