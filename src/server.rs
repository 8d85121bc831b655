//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/search` | Natural-language search |
//! | `POST`   | `/chat/{session}` | Send a chat message |
//! | `GET`    | `/chat/{session}` | Session transcript |
//! | `DELETE` | `/chat/{session}` | Clear a session |
//! | `GET`    | `/terminology` | List mappings (`?pending=true` for review queue) |
//! | `POST`   | `/terminology` | Add a manual mapping |
//! | `POST`   | `/terminology/{id}/approve` | Verify and activate a suggestion |
//! | `POST`   | `/terminology/{id}/reject` | Delete a pending suggestion |
//! | `GET`    | `/stats` | Content counts by type and state |
//! | `GET`    | `/reports/weekly` | Generate and store the weekly report |
//! | `POST`   | `/export/csv` | Export results as `text/csv` |
//! | `POST`   | `/webhooks/cms` | CMS item events |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal` (500).

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use portal_core::export::to_csv;
use portal_core::models::{ChatMessage, ContentStats, MapType, TerminologyMapping};

use crate::chat::{send_message, ChatReply};
use crate::config::Config;
use crate::export::collect_rows;
use crate::portal::Portal;
use crate::report::{self, WeeklyReport};
use crate::search::{search, SearchOutcome, SearchRequest};
use crate::terminology;
use crate::webhook::{self, WebhookEvent, WebhookOutcome, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Build the router over a shared [`Portal`].
pub fn router(portal: Arc<Portal>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route(
            "/chat/{session}",
            post(handle_chat).get(handle_transcript).delete(handle_clear_chat),
        )
        .route("/terminology", get(handle_list_terms).post(handle_add_term))
        .route("/terminology/{id}/approve", post(handle_approve_term))
        .route("/terminology/{id}/reject", post(handle_reject_term))
        .route("/stats", get(handle_stats))
        .route("/reports/weekly", get(handle_weekly_report))
        .route("/export/csv", post(handle_export_csv))
        .route("/webhooks/cms", post(handle_webhook))
        .layer(cors)
        .with_state(portal)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let portal = Arc::new(Portal::open(config).await?);
    if portal.config.webhook.secret().is_none() {
        warn!(
            env = %portal.config.webhook.secret_env,
            "webhook secret not set; CMS requests are accepted unsigned"
        );
    }
    let app = router(portal);

    println!("Content portal listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Map an operation error onto a status by its message. Validation
/// failures become 400 and missing rows 404.
fn classify(err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("not found") {
        not_found(msg)
    } else if msg.contains("must not be empty")
        || msg.contains("invalid")
        || msg.contains("already")
        || msg.contains("require")
        || msg.contains("must be")
    {
        bad_request(msg)
    } else {
        error!(error = %format!("{:#}", err), "request failed");
        internal(msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /search ============

async fn handle_search(
    State(portal): State<Arc<Portal>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    search(&portal, &req).await.map(Json).map_err(classify)
}

// ============ /chat/{session} ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

async fn handle_chat(
    State(portal): State<Arc<Portal>>,
    Path(session): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    send_message(&portal, &session, &req.message)
        .await
        .map(Json)
        .map_err(classify)
}

#[derive(Serialize)]
struct TranscriptResponse {
    session_id: String,
    messages: Vec<ChatMessage>,
}

async fn handle_transcript(
    State(portal): State<Arc<Portal>>,
    Path(session): Path<String>,
) -> Json<TranscriptResponse> {
    let messages = portal.sessions.transcript(&session).await;
    Json(TranscriptResponse {
        session_id: session,
        messages,
    })
}

async fn handle_clear_chat(
    State(portal): State<Arc<Portal>>,
    Path(session): Path<String>,
) -> Json<serde_json::Value> {
    let cleared = portal.sessions.clear(&session).await;
    Json(serde_json::json!({ "session_id": session, "cleared": cleared }))
}

// ============ /terminology ============

#[derive(Deserialize)]
struct TermListParams {
    #[serde(default)]
    pending: bool,
}

#[derive(Serialize)]
struct TermListResponse {
    mappings: Vec<TerminologyMapping>,
}

async fn handle_list_terms(
    State(portal): State<Arc<Portal>>,
    Query(params): Query<TermListParams>,
) -> Result<Json<TermListResponse>, AppError> {
    let mappings = terminology::list(portal.store.as_ref(), params.pending)
        .await
        .map_err(classify)?;
    Ok(Json(TermListResponse { mappings }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTermRequest {
    map_type: String,
    user_term: String,
    canonical_term: String,
}

async fn handle_add_term(
    State(portal): State<Arc<Portal>>,
    Json(req): Json<AddTermRequest>,
) -> Result<(StatusCode, Json<TerminologyMapping>), AppError> {
    let map_type = MapType::from_str(&req.map_type).map_err(|e| bad_request(e.to_string()))?;
    let row = terminology::add_manual(
        portal.store.as_ref(),
        &portal.terminology,
        map_type,
        &req.user_term,
        &req.canonical_term,
    )
    .await
    .map_err(classify)?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn handle_approve_term(
    State(portal): State<Arc<Portal>>,
    Path(id): Path<String>,
) -> Result<Json<TerminologyMapping>, AppError> {
    terminology::approve(portal.store.as_ref(), &portal.terminology, &id)
        .await
        .map(Json)
        .map_err(classify)
}

async fn handle_reject_term(
    State(portal): State<Arc<Portal>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    terminology::reject(portal.store.as_ref(), &id)
        .await
        .map_err(classify)?;
    Ok(Json(serde_json::json!({ "rejected": id })))
}

// ============ GET /stats ============

#[derive(Deserialize)]
struct StatsParams {
    #[serde(default = "default_days")]
    days: i64,
}

fn default_days() -> i64 {
    7
}

async fn handle_stats(
    State(portal): State<Arc<Portal>>,
    Query(params): Query<StatsParams>,
) -> Result<Json<ContentStats>, AppError> {
    portal
        .store
        .content_stats(Utc::now() - Duration::days(params.days.max(0)))
        .await
        .map(Json)
        .map_err(classify)
}

// ============ GET /reports/weekly ============

async fn handle_weekly_report(State(portal): State<Arc<Portal>>) -> Result<Json<WeeklyReport>, AppError> {
    report::weekly(&portal).await.map(Json).map_err(classify)
}

// ============ POST /export/csv ============

#[derive(Deserialize, Default)]
struct ExportRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    states: Vec<String>,
}

async fn handle_export_csv(
    State(portal): State<Arc<Portal>>,
    Json(req): Json<ExportRequest>,
) -> Result<Response, AppError> {
    let rows = collect_rows(&portal, req.query.as_deref(), &req.types, &req.states)
        .await
        .map_err(classify)?;
    let csv = to_csv(&rows);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"content-export.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

// ============ POST /webhooks/cms ============

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn handle_webhook(
    State(portal): State<Arc<Portal>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, AppError> {
    if let Some(secret) = portal.config.webhook.secret() {
        let ok = webhook::verify_signature(
            &secret,
            header_str(&headers, TIMESTAMP_HEADER),
            header_str(&headers, SIGNATURE_HEADER),
            &body,
        );
        if !ok {
            warn!("rejected webhook with bad signature");
            return Err(unauthorized("invalid webhook signature"));
        }
    }

    let event: WebhookEvent =
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid payload: {}", e)))?;
    webhook::handle_event(portal.store.as_ref(), &event, &portal.config.webhook.link_base)
        .await
        .map(Json)
        .map_err(classify)
}
