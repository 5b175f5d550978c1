use retirement_readiness_agent::{
    advice::AdvisoryGenerator,
    config::{self, currency_config, format_currency, Language},
    interview::InterviewEngine,
    llm::StreamHandler,
    projection::{
        calculate_projection, future_price, monthly_shortfall_gap, readiness_score,
        safe_monthly_income, Assumptions, ProjectionInput, ProjectionRow,
    },
    report::{
        build_projection_chart, build_readiness_gauge, generate_html_report, plotly_fragment,
        ReportContext,
    },
    session::InterviewSession,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::info;

const REPORT_PATH: &str = "retirement_report.html";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Keep the terminal clean; warnings still surface.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let language = Language::from_code(
        &std::env::var("AGENT_LANG").unwrap_or_else(|_| "EN".to_string()),
    );
    let currency = currency_config(
        &std::env::var("AGENT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
    )
    .code
    .to_string();

    let engine = Arc::new(InterviewEngine::from_env());
    if !engine.has_model() {
        eprintln!("⚠️  {} not set in .env", config::API_KEY_ENV);
        eprintln!("📌 The interview will answer with a configuration notice until it is set");
    }

    let mut session = InterviewSession::new(Arc::clone(&engine), language, &currency)?;

    println!("🎯 Retirement Readiness Interview");
    println!("Tell me about your finances and I'll check whether your plan holds up.");
    println!("Type 'exit' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();
    let mut ready = false;

    while !ready {
        print!("You: ");
        io::stdout().flush()?;

        buffer.clear();
        if stdin.lock().read_line(&mut buffer)? == 0 {
            break;
        }
        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return Ok(());
        }

        let outcome = session.handle_turn(line).await?;
        if let Some(reply) = outcome.reply {
            println!("Advisor: {}\n", reply);
        }
        ready = outcome.ready;
    }

    if !ready {
        // Stdin closed before the profile completed.
        return Ok(());
    }

    info!("Interview complete, building the readiness picture");
    println!("\n✅ Got everything I need. Crunching the numbers...\n");

    let profile = session.profile().clone();
    let input = ProjectionInput::from_profile(&profile, &currency)
        .ok_or("profile incomplete after interview")?;
    let assumptions = Assumptions::default();
    let rows = calculate_projection(&input);

    println!("{:<6} {:>20} {:>20}", "Age", "Real", "Nominal");
    for row in &rows {
        println!(
            "{:<6} {:>20} {:>20}",
            row.age,
            format_currency(row.real, &currency),
            format_currency(row.nominal, &currency),
        );
    }

    let last = rows.last().copied().unwrap_or(ProjectionRow {
        age: input.current_age,
        real: input.current_savings,
        nominal: input.current_savings,
    });
    let target = profile.target_monthly_expense.unwrap_or(0.0);
    let score = readiness_score(last.real, target);
    let safe_income = safe_monthly_income(last.real);
    let gap = monthly_shortfall_gap(last.real, target);

    println!("\n📊 Readiness score: {:.0}/100", score);
    println!(
        "💰 Sustainable income at {}: {}/month (target {})",
        input.retirement_age,
        format_currency(safe_income, &currency),
        format_currency(target, &currency),
    );
    if gap > 0.0 {
        println!("⚠️  Monthly shortfall: {}", format_currency(gap, &currency));
    } else {
        println!("✅ Your plan covers the target spending.");
    }

    // Stream the advisory straight to the terminal.
    println!("\n🧠 Advisor:\n");
    let advisor = AdvisoryGenerator::from_env();
    let on_token: StreamHandler = Arc::new(|delta, _full| {
        print!("{}", delta);
        let _ = io::stdout().flush();
    });

    let history: Vec<_> = session.visible_messages().into_iter().cloned().collect();
    let advice = advisor
        .generate_streaming(
            &profile,
            &rows,
            language,
            &currency,
            &history,
            Arc::clone(&on_token),
        )
        .await?;
    println!("\n");
    session.record_assistant(advice.as_str());

    // Self-contained HTML report next to the binary.
    let chart = build_projection_chart(&rows, target, &currency);
    let gauge = build_readiness_gauge(score, "Readiness Score");
    let figure = plotly_fragment(&chart, &gauge);
    let years = input.retirement_age.saturating_sub(input.current_age);
    let meal_at_retirement = future_price(
        currency_config(&currency).meal_price,
        assumptions.inflation_pct,
        years,
    );
    let report_history: Vec<_> = session.visible_messages().into_iter().cloned().collect();
    let html = generate_html_report(&ReportContext {
        profile: &profile,
        assumptions: &assumptions,
        safe_income,
        target_expense: target,
        future_food_price: meal_at_retirement,
        score,
        advice_history: &report_history,
        figure_html: &figure,
        language,
        currency: &currency,
    });
    std::fs::write(REPORT_PATH, html)?;
    println!("📄 Report written to {}\n", REPORT_PATH);

    // Follow-up questions keep flowing to the advisor.
    println!("Ask follow-up questions, or type 'exit' to finish.\n");
    loop {
        print!("You: ");
        io::stdout().flush()?;

        buffer.clear();
        if stdin.lock().read_line(&mut buffer)? == 0 {
            break;
        }
        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        session.handle_turn(line).await?;
        print!("Advisor: ");
        io::stdout().flush()?;

        let history: Vec<_> = session.visible_messages().into_iter().cloned().collect();
        let advice = advisor
            .generate_streaming(
                &profile,
                &rows,
                language,
                &currency,
                &history,
                Arc::clone(&on_token),
            )
            .await?;
        println!("\n");
        session.record_assistant(advice.as_str());
    }

    Ok(())
}
