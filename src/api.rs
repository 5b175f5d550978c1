//! REST API for the retirement readiness agent
//!
//! Session-based interview over HTTP plus the deterministic projection,
//! advisory and report endpoints. Backed by the same engine as the terminal
//! binary, so a frontend gets identical behavior.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::advice::AdvisoryGenerator;
use crate::config::{currency_config, Language};
use crate::interview::InterviewEngine;
use crate::llm::ChatMessage;
use crate::projection::{
    calculate_projection, future_price, monthly_shortfall_gap, readiness_score, required_nest_egg,
    safe_monthly_income, Assumptions, ProjectionInput, ProjectionRow,
};
use crate::report::{
    build_projection_chart, build_readiness_gauge, generate_html_report, plotly_fragment,
    ReportContext,
};
use crate::session::InterviewSession;

/// Upper bound on ages accepted over HTTP; the projection allocates one row
/// per year of the span.
const MAX_RETIREMENT_AGE: u32 = 120;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
    pub language: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionRequest {
    #[serde(flatten)]
    pub input: ProjectionInput,
    pub target_monthly_expense: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AdviceRequest {
    pub session_id: String,
    /// Optional follow-up question appended to the history first
    pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub session_id: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Metrics block shared by the projection and report endpoints
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReadinessMetrics {
    pub required_nest_egg: f64,
    pub safe_monthly_income: f64,
    pub monthly_shortfall_gap: f64,
    pub readiness_score: f64,
    pub final_real: f64,
    pub final_nominal: f64,
}

fn readiness_metrics(rows: &[ProjectionRow], target_monthly_expense: f64) -> ReadinessMetrics {
    let last = rows.last().copied().unwrap_or(ProjectionRow {
        age: 0,
        real: 0.0,
        nominal: 0.0,
    });

    ReadinessMetrics {
        required_nest_egg: required_nest_egg(target_monthly_expense),
        safe_monthly_income: safe_monthly_income(last.real),
        monthly_shortfall_gap: monthly_shortfall_gap(last.real, target_monthly_expense),
        readiness_score: readiness_score(last.real, target_monthly_expense),
        final_real: last.real,
        final_nominal: last.nominal,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<InterviewEngine>,
    pub advisor: Arc<AdvisoryGenerator>,
    /// Each session carries its own lock; the outer map guard is only ever
    /// held for lookup and insert, never across a model call.
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<InterviewSession>>>>>,
}

impl ApiState {
    pub fn new(engine: Arc<InterviewEngine>, advisor: Arc<AdvisoryGenerator>) -> Self {
        Self {
            engine,
            advisor,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            Arc::new(InterviewEngine::from_env()),
            Arc::new(AdvisoryGenerator::from_env()),
        )
    }
}

/// =============================
/// Helpers — Session Identity
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Clients may send any string as a session id; non-UUID values map to a
/// stable UUID so the same client string always hits the same session.
fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

fn gauge_label(language: Language) -> &'static str {
    match language {
        Language::En => "Readiness Score",
        Language::Th => "คะแนนความพร้อม",
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Interview Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Empty message".into())),
        );
    }

    let session_id = match req.session_id.as_deref() {
        // A blank id counts as absent: every anonymous client gets its own
        // session rather than landing on a shared fallback.
        Some(value) if !value.trim().is_empty() => {
            parse_or_stable_uuid(Some(value), "session-fallback")
        }
        _ => Uuid::new_v4(),
    };

    let session = {
        let mut sessions = state.sessions.write().await;
        match sessions.entry(session_id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(slot) => {
                let language = Language::from_code(req.language.as_deref().unwrap_or("EN"));
                let currency = currency_config(req.currency.as_deref().unwrap_or("USD")).code;
                let session =
                    match InterviewSession::new(Arc::clone(&state.engine), language, currency) {
                        Ok(session) => session,
                        Err(e) => {
                            return (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                Json(ApiResponse::error(format!("Session setup failed: {}", e))),
                            )
                        }
                    };
                info!(%session_id, lang = language.code(), currency, "Interview session created");
                Arc::clone(slot.insert(Arc::new(Mutex::new(session))))
            }
        }
    };

    // The turn runs under the per-session lock only; turns on other sessions
    // proceed in parallel.
    let mut session = session.lock().await;

    match session.handle_turn(&req.message).await {
        Ok(outcome) => {
            let missing: Vec<&str> = session
                .profile()
                .missing_fields()
                .iter()
                .map(|field| field.label())
                .collect();

            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "session_id": session_id.to_string(),
                    "reply": outcome.reply,
                    "ready": outcome.ready,
                    "missing_fields": missing,
                    "profile": session.profile(),
                }))),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Interview turn failed: {}", e))),
        ),
    }
}

/// =============================
/// Projection Endpoint
/// =============================

async fn projection_handler(Json(req): Json<ProjectionRequest>) -> (StatusCode, Json<ApiResponse>) {
    if req.input.retirement_age < req.input.current_age {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Retirement age must not precede current age".into(),
            )),
        );
    }
    if req.input.retirement_age > MAX_RETIREMENT_AGE {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Retirement age beyond the supported range".into(),
            )),
        );
    }

    let rows = calculate_projection(&req.input);
    let target = req.target_monthly_expense.unwrap_or(0.0);
    let metrics = readiness_metrics(&rows, target);
    let chart = build_projection_chart(&rows, target, &req.input.currency);
    let gauge = build_readiness_gauge(metrics.readiness_score, gauge_label(Language::En));

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "rows": rows,
            "metrics": metrics,
            "chart": chart,
            "gauge": gauge,
        }))),
    )
}

/// =============================
/// Advice Endpoint
/// =============================

async fn advice_handler(
    State(state): State<ApiState>,
    Json(req): Json<AdviceRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = parse_or_stable_uuid(Some(&req.session_id), "session-fallback");

    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&session_id).map(Arc::clone)
    };
    let Some(session) = session else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Unknown session".into())),
        );
    };
    let mut session = session.lock().await;

    if !session.is_ready() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Interview not complete".into())),
        );
    }

    if let Some(question) = req.question.as_deref() {
        if let Err(e) = session.handle_turn(question).await {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Recording question failed: {}", e))),
            );
        }
    }

    let Some(input) = ProjectionInput::from_profile(session.profile(), session.currency()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Profile incomplete".into())),
        );
    };
    if input.retirement_age > MAX_RETIREMENT_AGE {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Profile ages beyond the supported range".into(),
            )),
        );
    }
    let rows = calculate_projection(&input);
    let history: Vec<ChatMessage> = session.visible_messages().into_iter().cloned().collect();

    match state
        .advisor
        .generate(
            session.profile(),
            &rows,
            session.language(),
            session.currency(),
            &history,
        )
        .await
    {
        Ok(advice) => {
            session.record_assistant(advice.as_str());
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "session_id": session_id.to_string(),
                    "advice": advice,
                }))),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Advice generation failed: {}", e))),
        ),
    }
}

/// =============================
/// Report Endpoint
/// =============================

async fn report_handler(
    State(state): State<ApiState>,
    Json(req): Json<ReportRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = parse_or_stable_uuid(Some(&req.session_id), "session-fallback");

    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&session_id).map(Arc::clone)
    };
    let Some(session) = session else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Unknown session".into())),
        );
    };
    let session = session.lock().await;

    if !session.is_ready() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Interview not complete".into())),
        );
    }

    let profile = session.profile();
    let Some(input) = ProjectionInput::from_profile(profile, session.currency()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Profile incomplete".into())),
        );
    };
    if input.retirement_age > MAX_RETIREMENT_AGE {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Profile ages beyond the supported range".into(),
            )),
        );
    }

    let assumptions = Assumptions::default();
    let rows = calculate_projection(&input);
    let target = profile.target_monthly_expense.unwrap_or(0.0);
    let metrics = readiness_metrics(&rows, target);

    let chart = build_projection_chart(&rows, target, session.currency());
    let gauge = build_readiness_gauge(metrics.readiness_score, gauge_label(session.language()));
    let figure = plotly_fragment(&chart, &gauge);

    let years = input.retirement_age.saturating_sub(input.current_age);
    let meal_today = currency_config(session.currency()).meal_price;
    let meal_at_retirement = future_price(meal_today, assumptions.inflation_pct, years);

    let history: Vec<ChatMessage> = session.visible_messages().into_iter().cloned().collect();
    let html = generate_html_report(&ReportContext {
        profile,
        assumptions: &assumptions,
        safe_income: metrics.safe_monthly_income,
        target_expense: target,
        future_food_price: meal_at_retirement,
        score: metrics.readiness_score,
        advice_history: &history,
        figure_html: &figure,
        language: session.language(),
        currency: session.currency(),
    });

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id.to_string(),
            "html": html,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/projection", post(projection_handler))
        .route("/api/advice", post(advice_handler))
        .route("/api/report", post(report_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatModel, MockChatModel};
    use crate::profile::ProfileExtraction;
    use async_trait::async_trait;

    fn full_extraction() -> ProfileExtraction {
        ProfileExtraction {
            age: Some(30),
            retirement_age: Some(60),
            current_savings: Some(50_000.0),
            monthly_savings: Some(1_500.0),
            target_monthly_expense: Some(2_000.0),
            investment_style: Some("Mixed".to_string()),
        }
    }

    fn state_with(model: MockChatModel) -> ApiState {
        let model = Arc::new(model) as Arc<dyn ChatModel>;
        ApiState::new(
            Arc::new(InterviewEngine::with_model(Arc::clone(&model))),
            Arc::new(AdvisoryGenerator::with_model(model)),
        )
    }

    #[tokio::test]
    async fn test_chat_turn_reports_missing_fields() {
        let state = state_with(
            MockChatModel::new()
                .with_extraction(ProfileExtraction {
                    age: Some(30),
                    ..Default::default()
                })
                .with_reply("When would you like to retire?"),
        );

        let (status, Json(body)) = chat_handler(
            State(state),
            Json(ChatRequest {
                session_id: None,
                message: "I'm 30".into(),
                language: None,
                currency: None,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        let data = body.data.expect("data");
        assert_eq!(data["ready"], false);
        assert_eq!(data["reply"], "When would you like to retire?");
        assert_eq!(data["profile"]["age"], 30);
        let missing = data["missing_fields"].as_array().expect("array");
        assert!(missing.iter().any(|v| v == "Desired Retirement Age"));
    }

    #[tokio::test]
    async fn test_chat_completion_then_report() {
        let state = state_with(MockChatModel::new().with_extraction(full_extraction()));

        let (_, Json(body)) = chat_handler(
            State(state.clone()),
            Json(ChatRequest {
                session_id: Some("my-client-session".into()),
                message: "30, retire at 60, 50k saved, 1500/month, need 2000, mixed".into(),
                language: None,
                currency: Some("USD".into()),
            }),
        )
        .await;

        let data = body.data.expect("data");
        assert_eq!(data["ready"], true);
        assert!(data["reply"].is_null());

        let (status, Json(body)) = report_handler(
            State(state),
            Json(ReportRequest {
                session_id: "my-client-session".into(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let html = body.data.expect("data")["html"]
            .as_str()
            .expect("html string")
            .to_string();
        assert!(html.contains("Financial Freedom Report"));
        assert!(html.contains("Plotly.newPlot"));
    }

    #[tokio::test]
    async fn test_blank_session_ids_get_separate_sessions() {
        let state = state_with(
            MockChatModel::new()
                .with_extraction(ProfileExtraction::default())
                .with_reply("first question")
                .with_extraction(ProfileExtraction::default())
                .with_reply("second question"),
        );

        let (_, Json(first)) = chat_handler(
            State(state.clone()),
            Json(ChatRequest {
                session_id: Some("".into()),
                message: "I'd like to plan my retirement".into(),
                language: None,
                currency: None,
            }),
        )
        .await;
        let (_, Json(second)) = chat_handler(
            State(state.clone()),
            Json(ChatRequest {
                session_id: Some("   ".into()),
                message: "Me too".into(),
                language: None,
                currency: None,
            }),
        )
        .await;

        let first_id = first.data.expect("data")["session_id"]
            .as_str()
            .expect("id")
            .to_string();
        let second_id = second.data.expect("data")["session_id"]
            .as_str()
            .expect("id")
            .to_string();
        assert_ne!(first_id, second_id);
        assert_eq!(state.sessions.read().await.len(), 2);
    }

    /// Parks every extraction call at a shared barrier, so completion proves
    /// two turns were in flight at the same time.
    struct RendezvousModel {
        barrier: tokio::sync::Barrier,
        extraction: ProfileExtraction,
    }

    #[async_trait]
    impl ChatModel for RendezvousModel {
        async fn invoke(&self, _messages: &[ChatMessage]) -> crate::Result<ChatMessage> {
            Ok(ChatMessage::assistant("unused"))
        }

        async fn extract_profile(
            &self,
            _messages: &[ChatMessage],
        ) -> crate::Result<ProfileExtraction> {
            self.barrier.wait().await;
            Ok(self.extraction.clone())
        }
    }

    #[tokio::test]
    async fn test_unrelated_sessions_run_turns_concurrently() {
        let model = Arc::new(RendezvousModel {
            barrier: tokio::sync::Barrier::new(2),
            extraction: full_extraction(),
        }) as Arc<dyn ChatModel>;
        let state = ApiState::new(
            Arc::new(InterviewEngine::with_model(Arc::clone(&model))),
            Arc::new(AdvisoryGenerator::with_model(model)),
        );

        let turn = |state: ApiState, id: &str| {
            let id = id.to_string();
            async move {
                chat_handler(
                    State(state),
                    Json(ChatRequest {
                        session_id: Some(id),
                        message: "30, retire at 60, 50k saved, 1500/month, need 2000, mixed"
                            .into(),
                        language: None,
                        currency: None,
                    }),
                )
                .await
            }
        };

        // Each turn blocks inside the model until the other arrives, so this
        // join only finishes when the handlers overlap.
        let ((status_a, _), (status_b, _)) =
            tokio::time::timeout(std::time::Duration::from_secs(5), async {
                tokio::join!(
                    turn(state.clone(), "client-a"),
                    turn(state.clone(), "client-b")
                )
            })
            .await
            .expect("turns on different sessions must not queue behind one lock");

        assert_eq!(status_a, StatusCode::OK);
        assert_eq!(status_b, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_projection_rejects_inverted_ages() {
        let (status, Json(body)) = projection_handler(Json(ProjectionRequest {
            input: ProjectionInput::new(60, 30, 1000.0, 100.0),
            target_monthly_expense: None,
        }))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_projection_rejects_implausible_horizon() {
        let (status, Json(body)) = projection_handler(Json(ProjectionRequest {
            input: ProjectionInput::new(30, 500_000, 1000.0, 100.0),
            target_monthly_expense: None,
        }))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.error.as_deref(),
            Some("Retirement age beyond the supported range")
        );

        // The bound itself is still a valid horizon.
        let (status, _) = projection_handler(Json(ProjectionRequest {
            input: ProjectionInput::new(90, MAX_RETIREMENT_AGE, 1000.0, 100.0),
            target_monthly_expense: None,
        }))
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_projection_returns_rows_and_metrics() {
        let (status, Json(body)) = projection_handler(Json(ProjectionRequest {
            input: ProjectionInput::new(30, 32, 1000.0, 100.0),
            target_monthly_expense: Some(1000.0),
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = body.data.expect("data");
        assert_eq!(data["rows"].as_array().expect("rows").len(), 3);
        assert_eq!(data["metrics"]["required_nest_egg"], 300_000.0);
        assert_eq!(data["chart"]["traces"].as_array().expect("traces").len(), 2);
    }

    #[tokio::test]
    async fn test_report_requires_completed_interview() {
        let state = state_with(
            MockChatModel::new()
                .with_extraction(ProfileExtraction::default())
                .with_reply("tell me more"),
        );

        let (_, Json(_)) = chat_handler(
            State(state.clone()),
            Json(ChatRequest {
                session_id: Some("half-done".into()),
                message: "hello".into(),
                language: None,
                currency: None,
            }),
        )
        .await;

        let (status, Json(body)) = report_handler(
            State(state),
            Json(ReportRequest {
                session_id: "half-done".into(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.as_deref(), Some("Interview not complete"));
    }

    #[tokio::test]
    async fn test_advice_for_unknown_session_is_rejected() {
        let state = state_with(MockChatModel::new());

        let (status, Json(body)) = advice_handler(
            State(state),
            Json(AdviceRequest {
                session_id: "never-seen".into(),
                question: None,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.as_deref(), Some("Unknown session"));
    }

    #[test]
    fn test_stable_uuid_is_deterministic() {
        let a = parse_or_stable_uuid(Some("my-session"), "fallback");
        let b = parse_or_stable_uuid(Some("my-session"), "fallback");
        let c = parse_or_stable_uuid(Some("other-session"), "fallback");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let real = Uuid::new_v4();
        assert_eq!(
            parse_or_stable_uuid(Some(&real.to_string()), "fallback"),
            real
        );
    }
}
