// ---------------------------------------------------------------------------
// handlers/ - HTTP surface over the dispatch loop and the MCP bridge
// ---------------------------------------------------------------------------

pub(crate) mod chat;
pub(crate) mod system;

pub use chat::{chat, list_conversations};
pub use system::{auth_mode, clear_sessions, health, list_tools, readiness, refresh_tools};

use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure of a handler, rendered as
/// `{"error": {"code", "message", "request_id"}}`.
///
/// The full detail goes to the log under the request id; clients only see
/// the detail of `BadRequest`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conversation store failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(m) => m.clone(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, code = self.error_code(), "api: {}", self);
        } else {
            tracing::warn!(request_id = %request_id, code = self.error_code(), "api: {}", self);
        }

        let body = json!({
            "error": {
                "code": self.error_code(),
                "message": self.client_message(),
                "request_id": request_id,
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<crate::conversations::StoreError> for ApiError {
    fn from(e: crate::conversations::StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
