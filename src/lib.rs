pub mod auth;
pub mod config;
pub mod conversations;
pub mod core;
pub mod handlers;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod state;
pub mod tools;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        .route("/api/auth/mode", get(handlers::auth_mode));

    let protected = Router::new()
        // Chat
        .route("/api/chat", post(handlers::chat))
        .route("/api/conversations", get(handlers::list_conversations))
        // Tools / MCP
        .route("/api/tools", get(handlers::list_tools))
        .route("/api/tools/refresh", post(handlers::refresh_tools))
        .route("/api/mcp/sessions/clear", post(handlers::clear_sessions))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    public.merge(protected).with_state(state)
}
