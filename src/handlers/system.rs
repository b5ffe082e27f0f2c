// ---------------------------------------------------------------------------
// handlers/system.rs - Health, readiness, auth mode, tool catalog, MCP sessions
// ---------------------------------------------------------------------------

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::models::{HealthResponse, SessionsClearedResponse, ToolsResponse};
use crate::state::AppState;
use crate::tools::LoadReport;

// ---------------------------------------------------------------------------
// Health Endpoints
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let tools = state.registry.read().await.len();
    Json(HealthResponse {
        status: if state.is_ready() { "ok" } else { "starting" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        app: env!("CARGO_PKG_NAME").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tools,
    })
}

/// GET /api/health/ready - lightweight readiness check (no locks, no DB).
pub async fn readiness(State(state): State<AppState>) -> axum::response::Response {
    use axum::http::StatusCode;

    let ready = state.is_ready();
    let uptime = state.start_time.elapsed().as_secs();
    let body = json!({ "ready": ready, "uptime_seconds": uptime });

    if ready {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// GET /api/auth/mode - returns whether auth is required (public endpoint).
pub async fn auth_mode(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "auth_required": state.auth_secret.is_some()
    }))
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// GET /api/tools - `{name, description}` for every registered tool.
pub async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    let tools = state.dispatcher.list_tools().await;
    Json(ToolsResponse {
        count: tools.len(),
        tools,
    })
}

/// POST /api/tools/refresh - re-list every configured MCP server.
pub async fn refresh_tools(State(state): State<AppState>) -> Json<LoadReport> {
    Json(state.refresh_tools().await)
}

/// POST /api/mcp/sessions/clear - drop every cached MCP session.
pub async fn clear_sessions(State(state): State<AppState>) -> Json<SessionsClearedResponse> {
    let cleared = state.mcp.sessions().invalidate_all().await;
    tracing::info!("MCP: cleared {} cached session(s)", cleared);
    Json(SessionsClearedResponse { cleared })
}
