//! Language model client for OpenAI-compatible chat completion APIs.
//!
//! The pipeline talks to the model only through the [`LanguageModel`] trait,
//! so tests can substitute scripted responses. [`OpenAiClient`] is the real
//! implementation: it rate-limits, retries with exponential backoff, and can
//! stream the response while drawing a progress line.

use crate::config::LlmConfig;
use crate::console::Console;
use crate::error::LlmError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// Refusal phrases that indicate the model declined the request.
static REFUSAL_PHRASES: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec![
        "i'm sorry",
        "i cannot",
        "i am unable",
        "as an ai",
        "my apologies",
        "i am not programmed",
        "i do not have the ability",
    ]
});

/// A single system + user exchange.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Short description shown in progress output, e.g. "Chapter 3".
    pub label: String,
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(label: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model's reply, already trimmed and non-empty.
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Request body for the chat completions API.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Non-streaming response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Streaming chunk from the API.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<Choice>,
}

/// One parsed server-sent-events line.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Content(String),
    Done,
    Ignored,
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.trim_end_matches('\r').strip_prefix("data:") else {
        return SseEvent::Ignored;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            let text: String = chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.and_then(|d| d.content))
                .collect();
            if text.is_empty() {
                SseEvent::Ignored
            } else {
                SseEvent::Content(text)
            }
        }
        Err(_) => SseEvent::Ignored,
    }
}

/// Longest reply that is still checked for a refusal opener.
///
/// Prose regularly opens with "I cannot" or "I'm sorry"; a real refusal is
/// short and carries no `<response>` envelope.
const REFUSAL_MAX_CHARS: usize = 300;

/// Trims the reply and rejects empty answers and refusals.
fn validate_reply(raw: &str) -> Result<String, LlmError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LlmError::Refused("Empty response".to_string()));
    }

    if trimmed.contains("<response>") || trimmed.chars().count() > REFUSAL_MAX_CHARS {
        return Ok(trimmed.to_string());
    }

    let lower = trimmed.to_lowercase();
    if let Some(phrase) = REFUSAL_PHRASES.iter().find(|p| lower.starts_with(*p)) {
        return Err(LlmError::Refused(format!(
            "Response starts with refusal phrase: {}",
            phrase
        )));
    }

    Ok(trimmed.to_string())
}

/// Whether a failed request is worth sending again unchanged.
///
/// Refusals are content problems that each stage handles itself.
fn is_retryable(error: &LlmError) -> bool {
    !matches!(error, LlmError::Refused(_))
}

/// Splits a byte stream into server-sent-event lines.
///
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network chunks is decoded intact.
#[derive(Debug, Default)]
struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            events.push(parse_sse_line(&String::from_utf8_lossy(&line)));
        }
        events
    }

    /// Parses whatever is left once the stream ends.
    fn finish(&mut self) -> SseEvent {
        let rest = std::mem::take(&mut self.pending);
        parse_sse_line(&String::from_utf8_lossy(&rest))
    }
}

/// Backoff before retry number `attempt` (1-based).
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.min(6)))
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
    console: Console,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig, console: Console) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec.max(1)))
            .build()?;

        Ok(Self {
            client,
            config,
            console,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body<'a>(&'a self, prompt: &Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: self.config.stream,
        }
    }

    /// Issues one request without retrying.
    async fn complete_once(&self, prompt: &Prompt) -> Result<String, LlmError> {
        if self.config.delay_between_requests_sec > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(
                self.config.delay_between_requests_sec,
            ))
            .await;
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        let raw = if self.config.stream {
            self.read_stream(response, &prompt.label).await?
        } else {
            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| LlmError::ParseError(e.to_string()))?;
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content)
                .ok_or_else(|| LlmError::ParseError("No choices in API response".to_string()))?
        };

        validate_reply(&raw)
    }

    /// Accumulates a server-sent-events body, redrawing progress once a second.
    async fn read_stream(&self, response: reqwest::Response, label: &str) -> Result<String, LlmError> {
        let mut full_response = String::new();
        let mut decoder = SseDecoder::default();
        let start_time = Instant::now();
        let mut last_update = Instant::now();
        let mut stream = response.bytes_stream();

        'outer: while let Some(chunk) = stream.next().await {
            for event in decoder.push(&chunk?) {
                match event {
                    SseEvent::Content(text) => full_response.push_str(&text),
                    SseEvent::Done => break 'outer,
                    SseEvent::Ignored => {}
                }
            }

            if last_update.elapsed() >= Duration::from_secs(1) {
                self.console
                    .stream_progress(label, &full_response, start_time.elapsed());
                last_update = Instant::now();
            }
        }

        if let SseEvent::Content(text) = decoder.finish() {
            full_response.push_str(&text);
        }

        self.console.clear_line();
        Ok(full_response)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let attempts = self.config.retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.complete_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => {
                    if attempt < attempts {
                        let delay = backoff_delay(attempt);
                        self.console.warning(&format!(
                            "{}: request failed ({}), retrying in {:?} (attempt {}/{})",
                            prompt.label,
                            e,
                            delay,
                            attempt + 1,
                            attempts
                        ));
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts,
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client(stream: bool) -> OpenAiClient {
        let config = LlmConfig {
            stream,
            base_url: "https://example.com/v1/".to_string(),
            ..Default::default()
        };
        OpenAiClient::new(config, Console::quiet()).unwrap()
    }

    #[test]
    fn test_refusal_detection() {
        for phrase in [
            "I'm sorry, but I cannot",
            "As an AI, I must decline",
            "  I cannot assist with that",
        ] {
            assert!(
                matches!(validate_reply(phrase), Err(LlmError::Refused(_))),
                "Should detect refusal: {}",
                phrase
            );
        }
    }

    #[test]
    fn test_first_person_prose_is_not_a_refusal() {
        let prose = format!(
            "I cannot remember the last time the sea was calm. {}",
            "Mother said the tide would turn before the lanterns were lit. ".repeat(8)
        );
        assert!(validate_reply(&prose).is_ok());

        let wrapped = "<response>I'm sorry, Captain, the harbor is closed.</response>";
        assert!(validate_reply(wrapped).is_ok());
    }

    #[test]
    fn test_refusals_are_not_retried() {
        assert!(!is_retryable(&LlmError::Refused("no".to_string())));
        assert!(is_retryable(&LlmError::ApiError("HTTP 502".to_string())));
    }

    #[test]
    fn test_decoder_keeps_split_multibyte_chars() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"夜空の星\"}}]}\n";
        let bytes = line.as_bytes();
        // cut one byte into the first character
        let cut = line.find('夜').unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..cut]).is_empty());
        assert_eq!(
            decoder.push(&bytes[cut..]),
            vec![SseEvent::Content("夜空の星".to_string())]
        );
        assert_eq!(decoder.finish(), SseEvent::Ignored);
    }

    #[test]
    fn test_decoder_handles_trailing_line_without_newline() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Once\"}}]}\r\ndata: [DO");
        assert_eq!(events, vec![SseEvent::Content("Once".to_string())]);
        assert!(decoder.push(b"NE]").is_empty());
        assert_eq!(decoder.finish(), SseEvent::Done);
    }

    #[test]
    fn test_non_refusal() {
        let reply = validate_reply("  <response>The rain fell.</response>\n").unwrap();
        assert_eq!(reply, "<response>The rain fell.</response>");
    }

    #[test]
    fn test_empty_reply_rejected() {
        assert!(validate_reply(" \n ").is_err());
    }

    #[test]
    fn test_parse_sse_lines() {
        let line = r#"data: {"choices":[{"delta":{"content":"Once"},"index":0}]}"#;
        assert_eq!(parse_sse_line(line), SseEvent::Content("Once".to_string()));
        assert_eq!(parse_sse_line("data: [DONE]\r\n"), SseEvent::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseEvent::Ignored);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseEvent::Ignored
        );
    }

    #[test]
    fn test_request_body() {
        let client = make_client(false);
        let prompt = Prompt::new("Title", "be brief", "name this");
        let json = serde_json::to_value(client.request_body(&prompt)).unwrap();

        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["stream"], false);
        assert_eq!(json["max_tokens"], 8192);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "name this");
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        assert_eq!(
            make_client(true).endpoint(),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_backoff_grows() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(40), Duration::from_secs(64));
    }
}
