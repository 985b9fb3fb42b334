pub fn openai_chat_fixture() -> &'static str {
    return r#"
{
  "id": "chatcmpl-6f1e3a",
  "system_fingerprint": "0.25.2-mlx",
  "object": "chat.completion",
  "model": "default_model",
  "created": 1730000000,
  "choices": [
    {
      "index": 0,
      "finish_reason": "stop",
      "logprobs": {
        "token_logprobs": [-0.1, -0.2],
        "top_logprobs": [],
        "tokens": [9707, 0]
      },
      "message": {
        "role": "assistant",
        "content": "<think>\nThe user greets me.\n</think>\n\nHello there!",
        "tool_calls": []
      }
    }
  ],
  "usage": {
    "prompt_tokens": 12,
    "completion_tokens": 9,
    "total_tokens": 21
  }
}
"#
    .trim();
}

pub fn openai_stream_fixture() -> &'static str {
    return r#"
data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"role":"assistant","content":"Hello"},"finish_reason":null}]}

data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":" there"},"finish_reason":null}]}

data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"!"},"finish_reason":"stop"}]}

data: [DONE]
"#
    .trim();
}

pub fn ollama_chat_fixture() -> &'static str {
    return r#"
{
  "model": "llama3.2",
  "created_at": "2024-10-27T10:00:00.000000Z",
  "message": {
    "role": "assistant",
    "content": "Hello from Ollama!"
  },
  "done_reason": "stop",
  "done": true,
  "total_duration": 4883583458,
  "prompt_eval_count": 26,
  "eval_count": 5
}
"#
    .trim();
}

pub fn ollama_stream_fixture() -> &'static str {
    return r#"
{"model":"llama3.2","created_at":"2024-10-27T10:00:00Z","message":{"role":"assistant","content":"Hello"},"done":false}
{"model":"llama3.2","created_at":"2024-10-27T10:00:01Z","message":{"role":"assistant","content":" from"},"done":false}
{"model":"llama3.2","created_at":"2024-10-27T10:00:02Z","message":{"role":"assistant","content":" Ollama!"},"done":false}
{"model":"llama3.2","created_at":"2024-10-27T10:00:03Z","message":{"role":"assistant","content":""},"done_reason":"stop","done":true,"prompt_eval_count":26,"eval_count":3}
"#
    .trim();
}

pub fn lsof_listen_fixture() -> &'static str {
    return r#"
COMMAND   PID   USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
Python  41873 golem    5u  IPv4 0x1b2f3e4d5c6b7a80      0t0  TCP 127.0.0.1:8080 (LISTEN)
Python  41873 golem    7u  IPv6 0x1b2f3e4d5c6b7a81      0t0  TCP [::1]:8081 (LISTEN)
"#
    .trim();
}
