//! Self-contained HTML report
//!
//! One string, no external assets beyond the Plotly CDN inside the figure
//! fragment the caller supplies. Headings localize to the interview
//! language; all money goes through the currency formatter.

use crate::config::{format_currency, Language};
use crate::llm::{ChatMessage, MessageRole};
use crate::profile::FinancialProfile;
use crate::projection::Assumptions;
use crate::report::markdown::clean_markdown_table;
use chrono::Utc;

struct ReportLabels {
    title: &'static str,
    profile: &'static str,
    assumptions: &'static str,
    readiness: &'static str,
    advice: &'static str,
    age: &'static str,
    retirement_age: &'static str,
    current_savings: &'static str,
    monthly_savings: &'static str,
    investment_style: &'static str,
    annual_return: &'static str,
    inflation: &'static str,
    income_growth: &'static str,
    score: &'static str,
    safe_income: &'static str,
    target_expense: &'static str,
    food_price: &'static str,
    you: &'static str,
    advisor: &'static str,
    generated: &'static str,
}

impl ReportLabels {
    fn for_language(language: Language) -> Self {
        match language {
            Language::En => Self {
                title: "Financial Freedom Report",
                profile: "Your Profile",
                assumptions: "Assumptions",
                readiness: "Retirement Readiness",
                advice: "Advisor Conversation",
                age: "Current Age",
                retirement_age: "Retirement Age",
                current_savings: "Current Savings",
                monthly_savings: "Monthly Savings",
                investment_style: "Investment Style",
                annual_return: "Annual Return",
                inflation: "Inflation",
                income_growth: "Income Growth",
                score: "Readiness Score",
                safe_income: "Sustainable Monthly Income",
                target_expense: "Target Monthly Spending",
                food_price: "A typical meal at retirement",
                you: "You",
                advisor: "Advisor",
                generated: "Generated on",
            },
            Language::Th => Self {
                title: "รายงานอิสรภาพทางการเงิน",
                profile: "ข้อมูลของคุณ",
                assumptions: "สมมติฐาน",
                readiness: "ความพร้อมเกษียณ",
                advice: "บทสนทนากับที่ปรึกษา",
                age: "อายุปัจจุบัน",
                retirement_age: "อายุเกษียณ",
                current_savings: "เงินออมปัจจุบัน",
                monthly_savings: "เงินออมต่อเดือน",
                investment_style: "สไตล์การลงทุน",
                annual_return: "ผลตอบแทนต่อปี",
                inflation: "เงินเฟ้อ",
                income_growth: "การเติบโตของรายได้",
                score: "คะแนนความพร้อม",
                safe_income: "รายได้ต่อเดือนที่ยั่งยืน",
                target_expense: "ค่าใช้จ่ายต่อเดือนเป้าหมาย",
                food_price: "ราคาอาหารหนึ่งมื้อตอนเกษียณ",
                you: "คุณ",
                advisor: "ที่ปรึกษา",
                generated: "สร้างเมื่อ",
            },
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn format_percent(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{:.0}%", value)
    } else {
        format!("{:.1}%", value)
    }
}

const REPORT_STYLE: &str = "body { font-family: sans-serif; max-width: 860px; margin: 2rem auto; color: #222; }\n\
h1 { border-bottom: 3px solid #00CC96; padding-bottom: 0.3rem; }\n\
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }\n\
th, td { border: 1px solid #ddd; padding: 0.5rem 0.75rem; text-align: left; }\n\
th { background: #f5f5f5; }\n\
.bubble { border: 1px solid #eee; border-radius: 8px; padding: 0.75rem 1rem; margin: 0.75rem 0; }\n\
.bubble .who { font-weight: bold; margin: 0 0 0.25rem 0; }\n\
.bubble .text { white-space: pre-wrap; }\n\
.metric { font-size: 1.1rem; margin: 0.25rem 0; }\n\
footer { margin-top: 2rem; color: #888; font-size: 0.85rem; }";

/// Everything the report needs, already computed. `figure_html` is embedded
/// verbatim, so the caller decides how (and whether) charts are rendered.
pub struct ReportContext<'a> {
    pub profile: &'a FinancialProfile,
    pub assumptions: &'a Assumptions,
    pub safe_income: f64,
    pub target_expense: f64,
    pub future_food_price: f64,
    pub score: f64,
    pub advice_history: &'a [ChatMessage],
    pub figure_html: &'a str,
    pub language: Language,
    pub currency: &'a str,
}

/// Assemble the full report page as a single string.
pub fn generate_html_report(ctx: &ReportContext<'_>) -> String {
    let labels = ReportLabels::for_language(ctx.language);
    let style = ctx
        .profile
        .investment_style
        .as_deref()
        .map(escape_html)
        .unwrap_or_else(|| "-".to_string());

    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", labels.title));
    html.push_str(&format!("<style>\n{}\n</style>\n", REPORT_STYLE));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>🎯 {}</h1>\n", labels.title));

    // Profile table.
    html.push_str(&format!("<h2>{}</h2>\n<table>\n", labels.profile));
    let profile_rows = [
        (
            labels.age,
            ctx.profile
                .age
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        (
            labels.retirement_age,
            ctx.profile
                .retirement_age
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        (
            labels.current_savings,
            format_currency(ctx.profile.current_savings.unwrap_or(0.0), ctx.currency),
        ),
        (
            labels.monthly_savings,
            format_currency(ctx.profile.monthly_savings.unwrap_or(0.0), ctx.currency),
        ),
        (labels.investment_style, style),
    ];
    for (label, value) in profile_rows {
        html.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>\n", label, value));
    }
    html.push_str("</table>\n");

    // Assumptions.
    html.push_str(&format!("<h2>{}</h2>\n<ul>\n", labels.assumptions));
    html.push_str(&format!(
        "<li>{}: {}</li>\n",
        labels.annual_return,
        format_percent(ctx.assumptions.annual_return_pct)
    ));
    html.push_str(&format!(
        "<li>{}: {}</li>\n",
        labels.inflation,
        format_percent(ctx.assumptions.inflation_pct)
    ));
    html.push_str(&format!(
        "<li>{}: {}</li>\n",
        labels.income_growth,
        format_percent(ctx.assumptions.salary_growth_pct)
    ));
    html.push_str("</ul>\n");

    // Readiness metrics plus the figure fragment.
    html.push_str(&format!("<h2>{}</h2>\n", labels.readiness));
    html.push_str(&format!(
        "<p class=\"metric\">{}: <strong>{:.0} / 100</strong></p>\n",
        labels.score, ctx.score
    ));
    html.push_str(&format!(
        "<p class=\"metric\">{}: <strong>{}</strong></p>\n",
        labels.safe_income,
        format_currency(ctx.safe_income, ctx.currency)
    ));
    html.push_str(&format!(
        "<p class=\"metric\">{}: <strong>{}</strong></p>\n",
        labels.target_expense,
        format_currency(ctx.target_expense, ctx.currency)
    ));
    html.push_str(&format!(
        "<p class=\"metric\">{}: <strong>{}</strong></p>\n",
        labels.food_price,
        format_currency(ctx.future_food_price, ctx.currency)
    ));
    html.push_str(ctx.figure_html);
    html.push('\n');

    // Advisor conversation, tables repaired first.
    html.push_str(&format!("<h2>{}</h2>\n", labels.advice));
    for message in ctx.advice_history {
        let who = match message.role {
            MessageRole::Human => labels.you,
            MessageRole::Assistant => labels.advisor,
            MessageRole::System => continue,
        };
        let text = escape_html(&clean_markdown_table(&message.content));
        html.push_str(&format!(
            "<div class=\"bubble\"><p class=\"who\">{}</p><div class=\"text\">{}</div></div>\n",
            who, text
        ));
    }

    html.push_str(&format!(
        "<footer>{} {}</footer>\n",
        labels.generated,
        Utc::now().format("%Y-%m-%d")
    ));
    html.push_str("</body>\n</html>\n");

    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> FinancialProfile {
        FinancialProfile {
            age: Some(30),
            retirement_age: Some(60),
            current_savings: Some(100_000.0),
            monthly_savings: Some(2_000.0),
            target_monthly_expense: Some(1_000.0),
            investment_style: Some("Bank/Cash".to_string()),
        }
    }

    fn render(language: Language) -> String {
        let profile = sample_profile();
        let assumptions = Assumptions {
            annual_return_pct: 5.0,
            inflation_pct: 2.0,
            salary_growth_pct: 1.0,
        };
        let history = vec![
            ChatMessage::human("Tell me more"),
            ChatMessage::assistant("Stay diversified"),
        ];
        generate_html_report(&ReportContext {
            profile: &profile,
            assumptions: &assumptions,
            safe_income: 1200.0,
            target_expense: 1000.0,
            future_food_price: 75.0,
            score: 80.0,
            advice_history: &history,
            figure_html: "<div>figure</div>",
            language,
            currency: "USD",
        })
    }

    fn render_history(history: &[ChatMessage]) -> String {
        let profile = sample_profile();
        let assumptions = Assumptions::default();
        generate_html_report(&ReportContext {
            profile: &profile,
            assumptions: &assumptions,
            safe_income: 1200.0,
            target_expense: 1000.0,
            future_food_price: 75.0,
            score: 80.0,
            advice_history: history,
            figure_html: "",
            language: Language::En,
            currency: "USD",
        })
    }

    #[test]
    fn test_report_includes_title_metrics_advice_and_figure() {
        let html = render(Language::En);

        assert!(html.contains("Financial Freedom Report"));
        assert!(html.contains("$1,200"));
        assert!(html.contains("Stay diversified"));
        assert!(html.contains("<div>figure</div>"));
    }

    #[test]
    fn test_report_shows_profile_and_assumptions() {
        let html = render(Language::En);

        assert!(html.contains("Bank/Cash"));
        assert!(html.contains("$100,000"));
        assert!(html.contains("5%"));
        assert!(html.contains("2%"));
    }

    #[test]
    fn test_thai_report_uses_thai_headings() {
        let html = render(Language::Th);

        assert!(html.contains("รายงานอิสรภาพทางการเงิน"));
        assert!(html.contains("ที่ปรึกษา"));
        // Money still goes through the currency formatter.
        assert!(html.contains("$1,200"));
    }

    #[test]
    fn test_advice_tables_are_repaired() {
        let history = vec![ChatMessage::assistant(
            "```\n| Step | Action |\n| --- | --- |\n| 1 | Save |\n```",
        )];
        let html = render_history(&history);

        assert!(!html.contains("```"));
        assert!(html.contains("| Step | Action |"));
    }

    #[test]
    fn test_message_text_is_escaped() {
        let history = vec![ChatMessage::human("<script>alert(1)</script>")];
        let html = render_history(&history);

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_system_messages_stay_out_of_the_report() {
        let history = vec![
            ChatMessage::system("internal prompt"),
            ChatMessage::assistant("visible advice"),
        ];
        let html = render_history(&history);

        assert!(!html.contains("internal prompt"));
        assert!(html.contains("visible advice"));
    }
}
