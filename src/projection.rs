//! Deterministic retirement projection
//!
//! Pure arithmetic, no model calls: compound monthly growth of savings up to
//! the retirement age, in both nominal and inflation-adjusted terms, plus the
//! derived readiness metrics the advisory and report layers consume.

use crate::profile::FinancialProfile;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Withdrawal rate used to size the required nest egg (the "4% rule")
pub const SAFE_WITHDRAWAL_RATE: f64 = 0.04;

/// ================= Inputs =================

/// Market assumptions applied when the caller does not override them
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Assumptions {
    /// Expected annual investment return, percent
    pub annual_return_pct: f64,
    /// Expected annual inflation, percent
    pub inflation_pct: f64,
    /// Expected annual growth of the monthly contribution, percent
    pub salary_growth_pct: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            annual_return_pct: 7.0,
            inflation_pct: 3.0,
            salary_growth_pct: 2.0,
        }
    }
}

fn default_return_pct() -> f64 {
    Assumptions::default().annual_return_pct
}

fn default_inflation_pct() -> f64 {
    Assumptions::default().inflation_pct
}

fn default_salary_growth_pct() -> f64 {
    Assumptions::default().salary_growth_pct
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Everything the projection needs in one deserializable bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_savings: f64,
    pub monthly_savings: f64,
    #[serde(default = "default_return_pct")]
    pub annual_return_pct: f64,
    #[serde(default = "default_inflation_pct")]
    pub inflation_pct: f64,
    #[serde(default = "default_salary_growth_pct")]
    pub salary_growth_pct: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl ProjectionInput {
    pub fn new(
        current_age: u32,
        retirement_age: u32,
        current_savings: f64,
        monthly_savings: f64,
    ) -> Self {
        let assumptions = Assumptions::default();
        Self {
            current_age,
            retirement_age,
            current_savings,
            monthly_savings,
            annual_return_pct: assumptions.annual_return_pct,
            inflation_pct: assumptions.inflation_pct,
            salary_growth_pct: assumptions.salary_growth_pct,
            currency: default_currency(),
        }
    }

    pub fn with_assumptions(mut self, assumptions: Assumptions) -> Self {
        self.annual_return_pct = assumptions.annual_return_pct;
        self.inflation_pct = assumptions.inflation_pct;
        self.salary_growth_pct = assumptions.salary_growth_pct;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Build inputs from a completed profile; `None` while any required
    /// numeric field is still missing.
    pub fn from_profile(profile: &FinancialProfile, currency: &str) -> Option<Self> {
        Some(
            Self::new(
                profile.age?,
                profile.retirement_age?,
                profile.current_savings?,
                profile.monthly_savings?,
            )
            .with_currency(currency),
        )
    }
}

/// ================= Output =================

/// One year of the projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub age: u32,
    /// Balance in today's purchasing power
    pub real: f64,
    /// Balance in future currency units
    pub nominal: f64,
}

/// ================= Engine =================

/// Project savings year by year from the current age to the retirement age.
///
/// The first row is the starting position (real == nominal == current
/// savings). Each later year compounds the balance monthly at the annual
/// return, adds the monthly contribution after each month's growth, then
/// raises the contribution by the salary growth rate. The real column
/// deflates the nominal balance back to today's money.
pub fn calculate_projection(input: &ProjectionInput) -> Vec<ProjectionRow> {
    let monthly_rate = input.annual_return_pct / 100.0 / 12.0;
    let inflation_factor = 1.0 + input.inflation_pct / 100.0;
    let contribution_growth = 1.0 + input.salary_growth_pct / 100.0;

    let mut rows = Vec::with_capacity(
        (input.retirement_age.saturating_sub(input.current_age) as usize) + 1,
    );

    let mut nominal = input.current_savings;
    let mut monthly = input.monthly_savings;

    rows.push(ProjectionRow {
        age: input.current_age,
        real: nominal,
        nominal,
    });

    for age in (input.current_age + 1)..=input.retirement_age {
        for _ in 0..12 {
            nominal = nominal * (1.0 + monthly_rate) + monthly;
        }
        monthly *= contribution_growth;

        let years_out = (age - input.current_age) as f64;
        let real = nominal / inflation_factor.powf(years_out);

        rows.push(ProjectionRow { age, real, nominal });
    }

    debug!(
        years = rows.len(),
        final_nominal = rows.last().map(|r| r.nominal).unwrap_or(0.0),
        "Projection computed"
    );

    rows
}

/// ================= Readiness metrics =================

/// Nest egg that sustains the target monthly spend at the safe withdrawal rate
pub fn required_nest_egg(target_monthly_expense: f64) -> f64 {
    target_monthly_expense * 12.0 / SAFE_WITHDRAWAL_RATE
}

/// Monthly income a nest egg supports at the safe withdrawal rate
pub fn safe_monthly_income(nest_egg: f64) -> f64 {
    nest_egg * SAFE_WITHDRAWAL_RATE / 12.0
}

/// How far monthly income at retirement falls short of the target, in
/// today's money. Zero when the plan already covers the target.
pub fn monthly_shortfall_gap(real_at_retirement: f64, target_monthly_expense: f64) -> f64 {
    (target_monthly_expense - safe_monthly_income(real_at_retirement)).max(0.0)
}

/// Readiness on a 0..=100 scale: projected real balance against the
/// required nest egg, capped at 100.
pub fn readiness_score(real_at_retirement: f64, target_monthly_expense: f64) -> f64 {
    let required = required_nest_egg(target_monthly_expense);
    if required <= 0.0 {
        return 100.0;
    }
    (real_at_retirement / required * 100.0).min(100.0)
}

/// What a price today costs after `years` of inflation
pub fn future_price(price_today: f64, inflation_pct: f64, years: u32) -> f64 {
    price_today * (1.0 + inflation_pct / 100.0).powf(years as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> ProjectionInput {
        ProjectionInput::new(30, 32, 1000.0, 100.0)
            .with_assumptions(Assumptions {
                annual_return_pct: 10.0,
                inflation_pct: 2.0,
                salary_growth_pct: 0.0,
            })
            .with_currency("THB")
    }

    #[test]
    fn test_projection_covers_every_age() {
        let rows = calculate_projection(&sample_input());
        let ages: Vec<u32> = rows.iter().map(|r| r.age).collect();
        assert_eq!(ages, vec![30, 31, 32]);
    }

    #[test]
    fn test_first_row_is_the_starting_position() {
        let rows = calculate_projection(&sample_input());
        assert_eq!(rows[0].real, 1000.0);
        assert_eq!(rows[0].nominal, 1000.0);
    }

    #[test]
    fn test_nominal_grows_monotonically_with_contributions() {
        let rows = calculate_projection(&sample_input());
        for pair in rows.windows(2) {
            assert!(pair[1].nominal > pair[0].nominal);
        }
    }

    #[test]
    fn test_real_stays_below_nominal_under_inflation() {
        let rows = calculate_projection(&sample_input());
        for row in rows.iter().skip(1) {
            assert!(row.real < row.nominal);
        }
    }

    #[test]
    fn test_equal_ages_produce_single_row() {
        let input = ProjectionInput::new(40, 40, 5000.0, 200.0);
        let rows = calculate_projection(&input);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].age, 40);
        assert_eq!(rows[0].nominal, 5000.0);
    }

    #[test]
    fn test_first_year_compounds_twelve_months() {
        let input = ProjectionInput::new(30, 31, 1000.0, 100.0).with_assumptions(Assumptions {
            annual_return_pct: 12.0,
            inflation_pct: 0.0,
            salary_growth_pct: 0.0,
        });

        // 1% per month: balance = balance * 1.01 + 100, twelve times.
        let mut expected = 1000.0f64;
        for _ in 0..12 {
            expected = expected * 1.01 + 100.0;
        }

        let rows = calculate_projection(&input);
        assert!((rows[1].nominal - expected).abs() < 1e-9);
        // No inflation, so real == nominal.
        assert!((rows[1].real - rows[1].nominal).abs() < 1e-9);
    }

    #[test]
    fn test_salary_growth_raises_later_contributions() {
        let flat = calculate_projection(&ProjectionInput {
            salary_growth_pct: 0.0,
            ..sample_input()
        });
        let growing = calculate_projection(&ProjectionInput {
            salary_growth_pct: 5.0,
            ..sample_input()
        });

        // First projected year is identical (growth applies from year two).
        assert!((flat[1].nominal - growing[1].nominal).abs() < 1e-9);
        assert!(growing[2].nominal > flat[2].nominal);
    }

    #[test]
    fn test_required_nest_egg_follows_withdrawal_rate() {
        // 2000/month -> 24000/year -> 600000 at 4%.
        assert!((required_nest_egg(2000.0) - 600_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_safe_income_inverts_nest_egg() {
        let egg = required_nest_egg(1500.0);
        assert!((safe_monthly_income(egg) - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_shortfall_gap_floors_at_zero() {
        assert_eq!(monthly_shortfall_gap(10_000_000.0, 2000.0), 0.0);

        let gap = monthly_shortfall_gap(300_000.0, 2000.0);
        assert!((gap - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_readiness_score_caps_at_hundred() {
        assert_eq!(readiness_score(10_000_000.0, 1000.0), 100.0);

        let halfway = readiness_score(300_000.0, 2000.0);
        assert!((halfway - 50.0).abs() < 1e-9);

        assert_eq!(readiness_score(0.0, 0.0), 100.0);
    }

    #[test]
    fn test_future_price_compounds_inflation() {
        let price = future_price(100.0, 3.0, 2);
        assert!((price - 106.09).abs() < 1e-9);

        assert_eq!(future_price(100.0, 3.0, 0), 100.0);
    }

    #[test]
    fn test_input_deserializes_with_default_assumptions() {
        let input: ProjectionInput = serde_json::from_str(
            r#"{"current_age":30,"retirement_age":60,"current_savings":10000,"monthly_savings":500}"#,
        )
        .expect("minimal payload");

        assert_eq!(input.annual_return_pct, 7.0);
        assert_eq!(input.inflation_pct, 3.0);
        assert_eq!(input.salary_growth_pct, 2.0);
        assert_eq!(input.currency, "USD");
    }
}
