//! Personalized advisory generation
//!
//! Turns the completed profile and the projection outcome into a single
//! advisory prompt, then hands it to the chat model. Without an API key the
//! generator degrades to a fixed configuration notice instead of failing.

use crate::config::{self, format_currency, Language};
use crate::llm::{ChatMessage, ChatModel, StreamHandler};
use crate::profile::FinancialProfile;
use crate::projection::{
    monthly_shortfall_gap, readiness_score, required_nest_egg, safe_monthly_income, ProjectionRow,
};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Generates the final advisory from profile plus projection
pub struct AdvisoryGenerator {
    model: Option<Arc<dyn ChatModel>>,
}

impl AdvisoryGenerator {
    /// Build from the environment; degrades when no API key is configured.
    pub fn from_env() -> Self {
        match crate::llm::OpenRouterClient::from_env() {
            Some(client) => Self::with_model(Arc::new(client)),
            None => {
                warn!("No API key found, advisory generation degraded");
                Self::without_model()
            }
        }
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

    /// Produce the advisory in one shot.
    pub async fn generate(
        &self,
        profile: &FinancialProfile,
        rows: &[ProjectionRow],
        language: Language,
        currency: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        let model = match &self.model {
            Some(model) => model,
            None => return Ok(degraded_notice()),
        };

        let messages = advisory_messages(profile, rows, language, currency, history);
        let reply = model.invoke(&messages).await?;
        info!(chars = reply.content.len(), "Advisory generated");
        Ok(reply.content)
    }

    /// Produce the advisory while forwarding deltas to `on_token`.
    pub async fn generate_streaming(
        &self,
        profile: &FinancialProfile,
        rows: &[ProjectionRow],
        language: Language,
        currency: &str,
        history: &[ChatMessage],
        on_token: StreamHandler,
    ) -> Result<String> {
        let model = match &self.model {
            Some(model) => model,
            None => {
                let notice = degraded_notice();
                on_token(&notice, &notice);
                return Ok(notice);
            }
        };

        let messages = advisory_messages(profile, rows, language, currency, history);
        let advice = model.stream(&messages, on_token).await?;
        info!(chars = advice.len(), "Advisory streamed");
        Ok(advice)
    }
}

/// Fixed reply when no model is available
fn degraded_notice() -> String {
    format!(
        "⚠️ Configuration Error: {} not found. Set it in your environment or .env file to receive personalized advice.",
        config::API_KEY_ENV
    )
}

fn advisory_messages(
    profile: &FinancialProfile,
    rows: &[ProjectionRow],
    language: Language,
    currency: &str,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(advisory_prompt(
        profile, rows, language, currency,
    )));
    messages.extend(history.iter().cloned());
    messages
}

/// Assemble the advisory prompt with every number already computed, so the
/// model never has to do arithmetic.
fn advisory_prompt(
    profile: &FinancialProfile,
    rows: &[ProjectionRow],
    language: Language,
    currency: &str,
) -> String {
    let target_monthly = profile.target_monthly_expense.unwrap_or(0.0);
    let final_row = rows.last().copied().unwrap_or(ProjectionRow {
        age: profile.age.unwrap_or(0),
        real: profile.current_savings.unwrap_or(0.0),
        nominal: profile.current_savings.unwrap_or(0.0),
    });

    let required = required_nest_egg(target_monthly);
    let sustainable = safe_monthly_income(final_row.real);
    let gap = monthly_shortfall_gap(final_row.real, target_monthly);
    let score = readiness_score(final_row.real, target_monthly);

    let style = profile
        .investment_style
        .as_deref()
        .unwrap_or("not specified");

    let verdict = if gap > 0.0 {
        format!(
            "SHORTFALL: the plan is {} per month short of the target (in today's money).",
            format_currency(gap, currency)
        )
    } else {
        "ON TRACK: the plan covers the target monthly spending.".to_string()
    };

    format!(
        "You are a friendly, professional retirement planning advisor.\n\
        Write a personalized assessment of the user's retirement readiness.\n\n\
        ## Profile\n\
        - Current age: {age}\n\
        - Retirement age: {retirement_age}\n\
        - Current savings: {savings}\n\
        - Monthly savings: {monthly}\n\
        - Target monthly spending in retirement: {target}\n\
        - Investment style: {style}\n\n\
        ## Projection (already computed, do not recalculate)\n\
        - Projected balance at retirement: {final_nominal} nominal, {final_real} in today's money\n\
        - Required nest egg for the target (4% rule): {required}\n\
        - Sustainable monthly income at retirement: {sustainable}\n\
        - Readiness score: {score:.0} / 100\n\
        - {verdict}\n\n\
        ## Instructions\n\
        - Open with a one-paragraph verdict grounded in the numbers above.\n\
        - Give exactly 3 concrete, prioritized recommendations as a numbered list.\n\
        - Keep the advice aligned with the stated investment style.\n\
        - Use markdown headings and keep the whole reply under 400 words.\n\
        - Respond in {lang}.",
        age = profile.age.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string()),
        retirement_age = profile
            .retirement_age
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        savings = format_currency(profile.current_savings.unwrap_or(0.0), currency),
        monthly = format_currency(profile.monthly_savings.unwrap_or(0.0), currency),
        target = format_currency(target_monthly, currency),
        style = style,
        final_nominal = format_currency(final_row.nominal, currency),
        final_real = format_currency(final_row.real, currency),
        required = format_currency(required, currency),
        sustainable = format_currency(sustainable, currency),
        score = score,
        verdict = verdict,
        lang = language.display_name(),
    )
}
