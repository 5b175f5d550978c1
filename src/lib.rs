//! Retirement Readiness Agent
//!
//! A conversational retirement planner that:
//! - Interviews the user until six profile facts are known
//! - Extracts structured profile fields from free-form chat via an LLM
//! - Projects savings to retirement with deterministic arithmetic
//!   (the LLM never does the math)
//! - Generates personalized advice and a self-contained HTML report
//! - Degrades gracefully to fixed notices when no API key is configured
//!
//! INTERVIEW LOOP (one graph invocation per user turn):
//! USER MESSAGE → EXTRACT → MERGE PROFILE → COMPLETE? → QUESTION | READY

pub mod advice;
pub mod api;
pub mod config;
pub mod error;
pub mod interview;
pub mod llm;
pub mod profile;
pub mod projection;
pub mod report;
pub mod session;

pub use error::Result;

// Re-export common types
pub use profile::{FinancialProfile, ProfileExtraction, ProfileField};
pub use session::{InterviewSession, TurnOutcome};
