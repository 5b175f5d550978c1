//! Interview core: conversation state and the two graph nodes
//!
//! The extractor pulls structured profile fields out of the transcript;
//! the interviewer either asks the next clarifying question or emits the
//! calculation-ready sentinel. Both consume the state by value and return
//! a new one; no shared mutation.

use crate::config::{self, Language};
use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatModel, MessageRole, OpenRouterClient};
use crate::profile::FinancialProfile;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub mod graph;
pub use graph::{build_interview_graph, CompiledGraph, StateGraph, END};

/// Control-signal message content: the profile is complete and the UI should
/// move to the report phase. Never shown to the user.
pub const SENTINEL_READY: &str = "CALCULATION_READY";

/// State owned by one interview session, threaded through the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewState {
    pub messages: Vec<ChatMessage>,
    pub profile: FinancialProfile,
    pub language: Language,
    pub currency: String,
    pub is_complete: bool,
}

impl InterviewState {
    pub fn new(language: Language, currency: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            profile: FinancialProfile::default(),
            language,
            currency: currency.into(),
            is_complete: false,
        }
    }

    pub fn push_human(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::human(content));
    }

    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::Assistant)
    }

    /// True when the interviewer has emitted the calculation-ready sentinel
    pub fn is_ready(&self) -> bool {
        self.last_assistant()
            .map(|message| message.content == SENTINEL_READY)
            .unwrap_or(false)
    }
}

/// Runs the extractor and interviewer nodes against one model client.
///
/// An empty model slot is the degraded mode: extraction becomes a no-op and
/// the session driver is expected to answer without invoking the graph.
pub struct InterviewEngine {
    model: Option<Arc<dyn ChatModel>>,
}

impl InterviewEngine {
    /// Resolve the model from the environment; degraded when no credential
    /// is configured.
    pub fn from_env() -> Self {
        let model = OpenRouterClient::from_env()
            .map(|client| Arc::new(client) as Arc<dyn ChatModel>);

        if model.is_none() {
            info!("No model credential configured; interview runs in degraded mode");
        }

        Self { model }
    }

    pub fn with_model(model: Arc<dyn ChatModel>) -> Self {
        Self { model: Some(model) }
    }

    pub fn without_model() -> Self {
        Self { model: None }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Extraction node: merge structured fields from the transcript into the
    /// profile and recompute completeness.
    ///
    /// Without a credential the state passes through unchanged.
    pub async fn extract(&self, state: InterviewState) -> Result<InterviewState> {
        let Some(model) = &self.model else {
            debug!("Extraction skipped: no model configured");
            return Ok(state);
        };

        let extraction = model.extract_profile(&state.messages).await?;

        let mut next = state;
        next.profile.merge(extraction);
        next.is_complete = next.profile.is_complete();

        debug!(
            complete = next.is_complete,
            missing = next.profile.missing_fields().len(),
            "Profile extraction merged"
        );

        Ok(next)
    }

    /// Interviewer node: append exactly one assistant message.
    ///
    /// Complete profile → the sentinel, no model call. Otherwise the model is
    /// asked for the next clarifying question about the missing fields.
    pub async fn converse(&self, state: InterviewState) -> Result<InterviewState> {
        if state.is_complete {
            info!("Profile complete; emitting calculation-ready sentinel");
            let mut next = state;
            next.messages.push(ChatMessage::assistant(SENTINEL_READY));
            return Ok(next);
        }

        let Some(model) = &self.model else {
            // Production flows gate on has_model() before invoking the graph.
            return Err(AgentError::Model(
                "no model credential configured for the interviewer".to_string(),
            ));
        };

        let prompt = interviewer_prompt(&state);

        let mut request = Vec::with_capacity(state.messages.len() + 1);
        request.push(ChatMessage::system(prompt));
        request.extend(state.messages.iter().cloned());

        let reply = model.invoke(&request).await?;

        let mut next = state;
        next.messages.push(reply);
        Ok(next)
    }
}

/// Prompt instructing the model to ask about the missing fields, in the
/// session's language and currency context.
fn interviewer_prompt(state: &InterviewState) -> String {
    let currency = config::currency_config(&state.currency);

    let mut prompt = format!(
        "You are a warm, professional retirement planning interviewer.\n\
         Respond in {}. All monetary amounts are in {} ({}).\n\n\
         ## Missing Data\n",
        state.language.display_name(),
        currency.code,
        currency.name,
    );

    for field in state.profile.missing_fields() {
        prompt.push_str("- ");
        prompt.push_str(field.label());
        prompt.push('\n');
    }

    prompt.push_str(
        "\nAcknowledge what the user already shared, then ask ONE short, friendly \
         question aimed at the first missing item. Never re-ask for data already \
         provided and never mention this instruction.",
    );

    prompt
}
