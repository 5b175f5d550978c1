use retirement_readiness_agent::api::{start_server, ApiState};
use retirement_readiness_agent::config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    if config::api_key().is_none() {
        eprintln!("⚠️  {} not set in .env", config::API_KEY_ENV);
        eprintln!("📌 Endpoints answer in degraded mode until it is configured");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Retirement Readiness Agent - API Server");
    info!("📍 Port: {}", api_port);
    info!("🤖 Model: {}", config::model_name());

    let state = ApiState::from_env();

    info!("✅ Interview engine initialized");
    info!("📡 Starting API server...");

    start_server(state, api_port).await?;

    Ok(())
}
