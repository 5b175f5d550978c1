//! Financial profile built up turn by turn
//!
//! The profile is a set of optional fields refined by the extractor.
//! Merge is additive/overwrite-only: a populated field is never reset
//! to empty by a later partial extraction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fields the interview must collect before the report phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Age,
    RetirementAge,
    CurrentSavings,
    MonthlySavings,
    TargetMonthlyExpense,
    InvestmentStyle,
}

/// All fields are required for completeness, in interview order.
pub const REQUIRED_FIELDS: &[ProfileField] = &[
    ProfileField::Age,
    ProfileField::RetirementAge,
    ProfileField::CurrentSavings,
    ProfileField::MonthlySavings,
    ProfileField::TargetMonthlyExpense,
    ProfileField::InvestmentStyle,
];

impl ProfileField {
    /// JSON key the extractor schema uses for this field
    pub fn key(&self) -> &'static str {
        match self {
            ProfileField::Age => "age",
            ProfileField::RetirementAge => "retirement_age",
            ProfileField::CurrentSavings => "current_savings",
            ProfileField::MonthlySavings => "monthly_savings",
            ProfileField::TargetMonthlyExpense => "target_monthly_expense",
            ProfileField::InvestmentStyle => "investment_style",
        }
    }

    /// Human-readable label used in interviewer prompts
    pub fn label(&self) -> &'static str {
        match self {
            ProfileField::Age => "Current Age",
            ProfileField::RetirementAge => "Desired Retirement Age",
            ProfileField::CurrentSavings => "Current Savings",
            ProfileField::MonthlySavings => "Monthly Savings Amount",
            ProfileField::TargetMonthlyExpense => "Desired Retirement Lifestyle",
            ProfileField::InvestmentStyle => "Investment Style",
        }
    }

    /// One-line description for the extraction schema prompt
    pub fn description(&self) -> &'static str {
        match self {
            ProfileField::Age => "the user's current age in whole years",
            ProfileField::RetirementAge => "the age at which the user wants to retire",
            ProfileField::CurrentSavings => "total savings already set aside, in the session currency",
            ProfileField::MonthlySavings => "the amount the user saves each month",
            ProfileField::TargetMonthlyExpense => "desired monthly spending during retirement",
            ProfileField::InvestmentStyle => "how the savings are invested, e.g. Bank/Cash, Mixed, Stocks",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Structured record returned by the model's extraction call.
///
/// Every field is optional; only the fields the model could infer from the
/// conversation are populated. Unknown keys in the payload are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileExtraction {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub retirement_age: Option<u32>,
    #[serde(default)]
    pub current_savings: Option<f64>,
    #[serde(default)]
    pub monthly_savings: Option<f64>,
    #[serde(default)]
    pub target_monthly_expense: Option<f64>,
    #[serde(default)]
    pub investment_style: Option<String>,
}

impl ProfileExtraction {
    /// True when the extraction carries no field at all
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.retirement_age.is_none()
            && self.current_savings.is_none()
            && self.monthly_savings.is_none()
            && self.target_monthly_expense.is_none()
            && self.investment_style.is_none()
    }
}

/// Structured financial facts about the user, partially known
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinancialProfile {
    pub age: Option<u32>,
    pub retirement_age: Option<u32>,
    pub current_savings: Option<f64>,
    pub monthly_savings: Option<f64>,
    pub target_monthly_expense: Option<f64>,
    pub investment_style: Option<String>,
}

impl FinancialProfile {
    /// Merge an extraction into this profile.
    ///
    /// Fields present in the extraction overwrite; absent fields leave the
    /// existing value untouched.
    pub fn merge(&mut self, extraction: ProfileExtraction) {
        if extraction.age.is_some() {
            self.age = extraction.age;
        }
        if extraction.retirement_age.is_some() {
            self.retirement_age = extraction.retirement_age;
        }
        if extraction.current_savings.is_some() {
            self.current_savings = extraction.current_savings;
        }
        if extraction.monthly_savings.is_some() {
            self.monthly_savings = extraction.monthly_savings;
        }
        if extraction.target_monthly_expense.is_some() {
            self.target_monthly_expense = extraction.target_monthly_expense;
        }
        if extraction.investment_style.is_some() {
            self.investment_style = extraction.investment_style;
        }
    }

    fn has(&self, field: ProfileField) -> bool {
        match field {
            ProfileField::Age => self.age.is_some(),
            ProfileField::RetirementAge => self.retirement_age.is_some(),
            ProfileField::CurrentSavings => self.current_savings.is_some(),
            ProfileField::MonthlySavings => self.monthly_savings.is_some(),
            ProfileField::TargetMonthlyExpense => self.target_monthly_expense.is_some(),
            ProfileField::InvestmentStyle => self.investment_style.is_some(),
        }
    }

    /// True iff every required field is populated
    pub fn is_complete(&self) -> bool {
        REQUIRED_FIELDS.iter().all(|field| self.has(*field))
    }

    /// Required fields still unpopulated, in interview order
    pub fn missing_fields(&self) -> Vec<ProfileField> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !self.has(*field))
            .collect()
    }
}
