//! OpenRouter chat-completions client
//!
//! OpenAI-compatible wire format. Uses a long-lived reqwest::Client for
//! connection pooling. Structured extraction goes through JSON mode with
//! fence stripping; streaming parses SSE `data:` lines until `[DONE]`.

use crate::config;
use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatModel, MessageRole, StreamHandler};
use crate::profile::{ProfileExtraction, REQUIRED_FIELDS};
use crate::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const TEMPERATURE: f32 = 0.3;

/// Reusable OpenRouter client (connection-pooled)
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: config::base_url(),
            model: config::model_name(),
        }
    }

    /// Build a client from the environment; `None` when no credential is
    /// configured. Callers use `None` to enter degraded mode.
    pub fn from_env() -> Option<Self> {
        config::api_key().map(Self::new)
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post_chat(&self, request: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("OpenRouter error response ({}): {}", status, body);
            return Err(AgentError::Model(format!(
                "OpenRouter API error ({}): {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        let wire = wire_messages(messages);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: wire,
            temperature: TEMPERATURE,
            response_format: None,
            stream: false,
        };

        info!(model = %self.model, "Calling OpenRouter chat completion");

        let response = self.post_chat(&request).await?;
        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse OpenRouter response: {}", e);
            AgentError::Model(format!("OpenRouter parse error: {}", e))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AgentError::Model("Empty response from OpenRouter".to_string()))?;

        Ok(ChatMessage::assistant(content))
    }

    async fn extract_profile(&self, messages: &[ChatMessage]) -> Result<ProfileExtraction> {
        let instruction = extraction_instruction();

        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: &instruction,
        });
        wire.extend(wire_messages(messages));

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: wire,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
            stream: false,
        };

        info!(model = %self.model, "Calling OpenRouter structured extraction");

        let response = self.post_chat(&request).await?;
        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse OpenRouter response: {}", e);
            AgentError::Model(format!("OpenRouter parse error: {}", e))
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AgentError::Extraction("model returned no extraction payload".to_string())
            })?;

        let stripped = strip_code_fences(&text);
        if stripped.is_empty() {
            return Err(AgentError::Extraction(
                "model returned an empty extraction payload".to_string(),
            ));
        }

        debug!("Extraction payload: {}", stripped);

        // Structurally invalid payloads propagate; the caller treats that as
        // a turn-level failure rather than guessing a default profile.
        let extraction: ProfileExtraction = serde_json::from_str(stripped)?;
        Ok(extraction)
    }

    async fn stream(&self, messages: &[ChatMessage], on_token: StreamHandler) -> Result<String> {
        let wire = wire_messages(messages);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: wire,
            temperature: TEMPERATURE,
            response_format: None,
            stream: true,
        };

        info!(model = %self.model, "Calling OpenRouter streaming completion");

        let response = self.post_chat(&request).await?;
        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut full = String::new();

        while let Some(chunk) = stream.next().await {
            lines.push(chunk?.as_ref());

            while let Some(line) = lines.next_line()? {
                if let Some(data) = line.strip_prefix("data:") {
                    let data = data.trim();
                    if data == "[DONE]" {
                        return Ok(full);
                    }
                    apply_stream_data(data, &on_token, &mut full)?;
                }
            }
        }

        // A stream can end without the [DONE] marker; flush anything left.
        let trailing = lines.take_rest()?;
        if let Some(data) = trailing.strip_prefix("data:") {
            let data = data.trim();
            if data != "[DONE]" {
                apply_stream_data(data, &on_token, &mut full)?;
            }
        }

        Ok(full)
    }
}

/// Newline-delimited buffer over the raw response bytes. Lines are split
/// before UTF-8 decoding, so a multi-byte character straddling two network
/// chunks is reassembled instead of rejected.
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete line, trimmed, or `None` until one arrives.
    fn next_line(&mut self) -> Result<Option<String>> {
        let Some(pos) = self.bytes.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        Ok(Some(decode_utf8(&line)?.trim().to_string()))
    }

    /// Whatever remains after the last newline, trimmed.
    fn take_rest(&mut self) -> Result<String> {
        let rest = decode_utf8(&self.bytes)?.trim().to_string();
        self.bytes.clear();
        Ok(rest)
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| AgentError::Model(format!("invalid UTF-8 in streaming response: {}", e)))
}

fn apply_stream_data(data: &str, on_token: &StreamHandler, full: &mut String) -> Result<()> {
    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        AgentError::Model(format!("failed to parse OpenRouter stream chunk: {}", e))
    })?;

    for choice in chunk.choices {
        let Some(delta) = choice.delta else {
            continue;
        };

        if let Some(content) = delta.content {
            if !content.is_empty() {
                full.push_str(&content);
                on_token(&content, full);
            }
        }
    }

    Ok(())
}

fn wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|message| WireMessage {
            role: match message.role {
                MessageRole::Human => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::System => "system",
            },
            content: &message.content,
        })
        .collect()
}

/// System instruction for the extraction call, built from the profile schema
fn extraction_instruction() -> String {
    let mut prompt = String::from(
        "You are a data-extraction engine for a retirement planning interview.\n\
         Read the conversation and return ONE JSON object. Allowed keys:\n",
    );

    for field in REQUIRED_FIELDS {
        prompt.push_str(&format!("- \"{}\": {}\n", field.key(), field.description()));
    }

    prompt.push_str(
        "\nRules:\n\
         - Include a key only when the conversation states or clearly implies its value.\n\
         - Numeric values must be plain JSON numbers, no separators or currency symbols.\n\
         - Never invent values; omit anything uncertain.\n\
         - Return {} if nothing can be extracted.",
    );

    prompt
}

/// Strip ```json ... ``` or ``` ... ``` fences the model sometimes wraps
/// JSON payloads in.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or_else(|| stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or_else(|| stripped.trim_start())
    } else {
        text
    }
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireReply,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::human("How much should I save?")];
        let wire = wire_messages(&messages);
        let request = ChatCompletionRequest {
            model: "openai/gpt-4o-mini",
            messages: wire,
            temperature: TEMPERATURE,
            response_format: None,
            stream: false,
        };

        let json = serde_json::to_string(&request).expect("request serializes");
        assert!(json.contains("How much should I save?"));
        assert!(json.contains("\"role\":\"user\""));
        // Non-streaming requests omit the stream flag entirely.
        assert!(!json.contains("\"stream\""));
    }

    #[test]
    fn test_streaming_request_sets_flag() {
        let request = ChatCompletionRequest {
            model: "m",
            messages: vec![],
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
            stream: true,
        };

        let json = serde_json::to_string(&request).expect("request serializes");
        assert!(json.contains("\"stream\":true"));
        assert!(json.contains("\"type\":\"json_object\""));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            strip_code_fences("```json\n{\"age\": 35}\n```"),
            "{\"age\": 35}"
        );
        assert_eq!(strip_code_fences("```\n{\"age\": 35}\n```"), "{\"age\": 35}");
        assert_eq!(strip_code_fences("{\"age\": 35}"), "{\"age\": 35}");
    }

    #[test]
    fn test_apply_stream_data_accumulates() {
        let updates: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let handler: StreamHandler = Arc::new(move |delta, full| {
            sink.lock()
                .expect("sink poisoned")
                .push((delta.to_string(), full.to_string()));
        });

        let mut full = String::new();
        apply_stream_data(
            r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
            &handler,
            &mut full,
        )
        .expect("valid chunk");
        apply_stream_data(
            r#"{"choices":[{"delta":{"content":" world"}}]}"#,
            &handler,
            &mut full,
        )
        .expect("valid chunk");
        // Role-only deltas carry no content and must be ignored.
        apply_stream_data(r#"{"choices":[{"delta":{}}]}"#, &handler, &mut full)
            .expect("empty delta");

        assert_eq!(full, "Hello world");
        let updates = updates.lock().expect("sink poisoned");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1], (" world".to_string(), "Hello world".to_string()));
    }

    #[test]
    fn test_line_buffer_reassembles_split_multibyte_chars() {
        let line = "data: สวัสดี\n".as_bytes();
        // Cut inside the first Thai character (three bytes in UTF-8).
        let cut = "data: ".len() + 1;

        let mut buffer = LineBuffer::new();
        buffer.push(&line[..cut]);
        assert!(buffer
            .next_line()
            .expect("partial line is not an error")
            .is_none());

        buffer.push(&line[cut..]);
        assert_eq!(
            buffer.next_line().expect("complete line decodes").as_deref(),
            Some("data: สวัสดี")
        );
        assert!(buffer.next_line().expect("buffer drained").is_none());
    }

    #[test]
    fn test_line_buffer_flushes_trailing_bytes() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"data: [DONE]");
        assert!(buffer.next_line().expect("no newline yet").is_none());
        assert_eq!(
            buffer.take_rest().expect("trailing decodes"),
            "data: [DONE]"
        );
    }

    #[test]
    fn test_extraction_instruction_names_every_field() {
        let instruction = extraction_instruction();
        for field in REQUIRED_FIELDS {
            assert!(instruction.contains(field.key()));
        }
        assert!(instruction.contains("Return {}"));
    }
}
