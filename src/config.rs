//! Runtime configuration
//!
//! Credential/endpoint lookup via environment variables, plus the static
//! currency and language tables consumed by the interview and report layers.
//! A missing API key is a degraded mode, never an error.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Environment variable holding the OpenRouter credential
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Default chat-completions endpoint (OpenAI-compatible)
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model routed through OpenRouter
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Read the model credential, treating blank values as absent.
///
/// Every degraded-mode path in the crate keys off this returning `None`.
pub fn api_key() -> Option<String> {
    match env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => None,
    }
}

/// Chat-completions base URL, overridable for self-hosted gateways.
pub fn base_url() -> String {
    env::var("OPENROUTER_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Model identifier used for every call.
pub fn model_name() -> String {
    env::var("AGENT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

//
// ================= Language =================
//

/// Interview language. The interviewer and advisory prompts instruct the
/// model to respond in this language; report headings are localized to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    En,
    Th,
}

impl Language {
    /// Parse a two-letter code, defaulting to English for anything unknown.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "TH" => Language::Th,
            _ => Language::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Th => "TH",
        }
    }

    /// Name used inside prompts ("Respond in {display_name}").
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Th => "Thai",
        }
    }
}

//
// ================= Currency =================
//

/// Static formatting rules for one currency, plus the price of a typical
/// meal today (the report's inflation illustration)
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyConfig {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    pub meal_price: f64,
}

lazy_static! {
    /// Currency code → symbol/name table, read-only
    pub static ref CURRENCY_CONFIG: HashMap<&'static str, CurrencyConfig> = {
        let mut map = HashMap::new();
        map.insert("USD", CurrencyConfig { code: "USD", symbol: "$", name: "US Dollar", meal_price: 15.0 });
        map.insert("THB", CurrencyConfig { code: "THB", symbol: "฿", name: "Thai Baht", meal_price: 80.0 });
        map.insert("EUR", CurrencyConfig { code: "EUR", symbol: "€", name: "Euro", meal_price: 14.0 });
        map.insert("GBP", CurrencyConfig { code: "GBP", symbol: "£", name: "British Pound", meal_price: 13.0 });
        map.insert("JPY", CurrencyConfig { code: "JPY", symbol: "¥", name: "Japanese Yen", meal_price: 1000.0 });
        map.insert("INR", CurrencyConfig { code: "INR", symbol: "₹", name: "Indian Rupee", meal_price: 250.0 });
        map
    };
}

/// Look up a currency, falling back to USD for unknown codes.
pub fn currency_config(code: &str) -> &'static CurrencyConfig {
    let upper = code.trim().to_uppercase();
    CURRENCY_CONFIG
        .get(upper.as_str())
        .unwrap_or_else(|| &CURRENCY_CONFIG["USD"])
}

/// Format an amount with the currency symbol and thousands separators,
/// rounded to whole units (reports show "$1,200", not "$1,200.00").
pub fn format_currency(amount: f64, code: &str) -> String {
    let config = currency_config(code);
    let rounded = amount.round() as i64;

    if rounded < 0 {
        format!("-{}{}", config.symbol, group_thousands(rounded.unsigned_abs()))
    } else {
        format!("{}{}", config.symbol, group_thousands(rounded as u64))
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency_groups_thousands() {
        assert_eq!(format_currency(1200.0, "USD"), "$1,200");
        assert_eq!(format_currency(1_234_567.0, "USD"), "$1,234,567");
        assert_eq!(format_currency(75.0, "THB"), "฿75");
        assert_eq!(format_currency(999.4, "USD"), "$999");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(-500.0, "USD"), "-$500");
    }

    #[test]
    fn test_unknown_currency_falls_back_to_usd() {
        let config = currency_config("XYZ");
        assert_eq!(config.code, "USD");
        assert_eq!(format_currency(10.0, "xyz"), "$10");
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!(Language::from_code("TH"), Language::Th);
        assert_eq!(Language::from_code("th"), Language::Th);
        assert_eq!(Language::from_code("EN"), Language::En);
        assert_eq!(Language::from_code("fr"), Language::En);
        assert_eq!(Language::Th.display_name(), "Thai");
    }

    #[test]
    fn test_api_key_blank_is_absent() {
        env::remove_var(API_KEY_ENV);
        assert!(api_key().is_none());

        env::set_var(API_KEY_ENV, "   ");
        assert!(api_key().is_none());

        env::set_var(API_KEY_ENV, "test-key");
        assert_eq!(api_key().as_deref(), Some("test-key"));
        env::remove_var(API_KEY_ENV);
    }
}
