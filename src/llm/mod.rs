//! Language-model client abstraction
//!
//! One seam for every model call the agent makes: plain invocation,
//! structured profile extraction, and token streaming. The production
//! implementation talks to OpenRouter; `MockChatModel` keeps the system
//! functional (and testable) without an LLM dependency.

use crate::profile::ProfileExtraction;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub mod openrouter;
pub use openrouter::OpenRouterClient;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Assistant,
    System,
}

/// A single message in the interview transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Callback invoked per streamed fragment with `(delta, accumulated_so_far)`
pub type StreamHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Abstract model capability consumed by the extractor, interviewer and
/// advisory generator. One external call per method invocation; failures
/// propagate to the caller as turn-level errors.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the messages and return the model's reply as one assistant message.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage>;

    /// Structured extraction: ask the model for a JSON object matching the
    /// profile schema (all fields optional) and parse it.
    async fn extract_profile(&self, messages: &[ChatMessage]) -> Result<ProfileExtraction>;

    /// Stream the reply, reporting each fragment through `on_token`, and
    /// return the full concatenated text once the stream completes.
    ///
    /// The default degrades to a single `invoke` with one callback.
    async fn stream(&self, messages: &[ChatMessage], on_token: StreamHandler) -> Result<String> {
        let reply = self.invoke(messages).await?;
        on_token(&reply.content, &reply.content);
        Ok(reply.content)
    }
}

//
// ================= Mock =================
//

/// Scripted model for development and testing.
/// Keeps every pipeline runnable without network access.
#[derive(Default)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<String>>,
    extractions: Mutex<VecDeque<ProfileExtraction>>,
    stream_scripts: Mutex<VecDeque<Vec<String>>>,
    seen_messages: Mutex<Vec<Vec<ChatMessage>>>,
    invocations: AtomicUsize,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.replies
            .lock()
            .expect("mock reply queue poisoned")
            .push_back(content.into());
        self
    }

    pub fn with_extraction(self, extraction: ProfileExtraction) -> Self {
        self.extractions
            .lock()
            .expect("mock extraction queue poisoned")
            .push_back(extraction);
        self
    }

    pub fn with_stream_chunks(self, chunks: Vec<&str>) -> Self {
        self.stream_scripts
            .lock()
            .expect("mock stream queue poisoned")
            .push_back(chunks.into_iter().map(String::from).collect());
        self
    }

    /// Number of model calls made across all methods
    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Messages passed to the most recent call, if any
    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.seen_messages
            .lock()
            .expect("mock seen-messages poisoned")
            .last()
            .cloned()
    }

    fn record_call(&self, messages: &[ChatMessage]) {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.seen_messages
            .lock()
            .expect("mock seen-messages poisoned")
            .push(messages.to_vec());
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        self.record_call(messages);

        let reply = self
            .replies
            .lock()
            .expect("mock reply queue poisoned")
            .pop_front()
            .ok_or_else(|| crate::error::AgentError::Model("mock has no scripted reply".to_string()))?;

        Ok(ChatMessage::assistant(reply))
    }

    async fn extract_profile(&self, messages: &[ChatMessage]) -> Result<ProfileExtraction> {
        self.record_call(messages);

        self.extractions
            .lock()
            .expect("mock extraction queue poisoned")
            .pop_front()
            .ok_or_else(|| {
                crate::error::AgentError::Model("mock has no scripted extraction".to_string())
            })
    }

    async fn stream(&self, messages: &[ChatMessage], on_token: StreamHandler) -> Result<String> {
        self.record_call(messages);

        let chunks = self
            .stream_scripts
            .lock()
            .expect("mock stream queue poisoned")
            .pop_front()
            .ok_or_else(|| {
                crate::error::AgentError::Model("mock has no scripted stream".to_string())
            })?;

        let mut full = String::new();
        for chunk in &chunks {
            full.push_str(chunk);
            on_token(chunk, &full);
        }

        Ok(full)
    }
}
