//! Interview session driver
//!
//! Owns the conversation state and the compiled graph, and runs one graph
//! invocation per user turn. The readiness sentinel never reaches the
//! caller: the session consumes it and flips into the ready phase.

use crate::config::{self, Language};
use crate::interview::{build_interview_graph, CompiledGraph, InterviewEngine, InterviewState};
use crate::llm::{ChatMessage, MessageRole};
use crate::profile::FinancialProfile;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// What a single turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant reply to show, absent on the turn that completes the
    /// interview (the sentinel is swallowed)
    pub reply: Option<String>,
    /// True once the profile is complete and the report phase can start
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Interview,
    Ready,
}

/// One user's interview from first question to readiness
pub struct InterviewSession {
    engine: Arc<InterviewEngine>,
    graph: CompiledGraph,
    state: InterviewState,
    phase: Phase,
}

impl InterviewSession {
    pub fn new(engine: Arc<InterviewEngine>, language: Language, currency: &str) -> Result<Self> {
        let graph = build_interview_graph(Arc::clone(&engine))?;
        Ok(Self {
            engine,
            graph,
            state: InterviewState::new(language, currency),
            phase: Phase::Interview,
        })
    }

    pub fn state(&self) -> &InterviewState {
        &self.state
    }

    pub fn profile(&self) -> &FinancialProfile {
        &self.state.profile
    }

    pub fn language(&self) -> Language {
        self.state.language
    }

    pub fn currency(&self) -> &str {
        &self.state.currency
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Record an assistant message produced outside the graph (the advisory
    /// phase), so follow-up questions carry full context.
    pub fn record_assistant(&mut self, content: impl Into<String>) {
        self.state.messages.push(ChatMessage::assistant(content));
    }

    /// Transcript for display: no system prompts, no sentinel.
    pub fn visible_messages(&self) -> Vec<&ChatMessage> {
        self.state
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .filter(|m| m.content != crate::interview::SENTINEL_READY)
            .collect()
    }

    /// Run one turn: record the user message, drive the graph, and report
    /// whether the interview just completed.
    pub async fn handle_turn(&mut self, user_input: &str) -> Result<TurnOutcome> {
        self.state.push_human(user_input);

        if self.phase == Phase::Ready {
            debug!("Turn after readiness, recorded for the advice history");
            return Ok(TurnOutcome {
                reply: None,
                ready: true,
            });
        }

        if !self.engine.has_model() {
            let notice = format!(
                "⚠️ Configuration Error: {} not found. Set it in your environment or .env file to start the interview.",
                config::API_KEY_ENV
            );
            self.state.messages.push(ChatMessage::assistant(notice.clone()));
            return Ok(TurnOutcome {
                reply: Some(notice),
                ready: false,
            });
        }

        let next = self.graph.invoke(self.state.clone()).await?;
        self.state = next;

        if self.state.is_ready() {
            // Swallow the sentinel so it never shows up in a transcript.
            self.state.messages.pop();
            self.phase = Phase::Ready;
            info!("Interview complete, profile ready for projection");
            return Ok(TurnOutcome {
                reply: None,
                ready: true,
            });
        }

        let reply = self
            .state
            .last_assistant()
            .map(|m| m.content.clone());

        Ok(TurnOutcome {
            reply,
            ready: false,
        })
    }
}
