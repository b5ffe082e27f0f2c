// ---------------------------------------------------------------------------
// handlers/chat.rs - one chat turn, conversation log
// ---------------------------------------------------------------------------

use axum::extract::{Query, State};
use axum::Json;

use crate::conversations::{to_history, Conversation};
use crate::models::{ChatRequest, ChatResponse, ConversationsQuery};
use crate::state::AppState;

use super::ApiError;

const DEFAULT_CONVERSATIONS: i64 = 10;
const MAX_CONVERSATIONS: i64 = 100;

/// POST /api/chat - run one turn with recent conversations as history.
///
/// History and save failures are logged and never fail the request.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let window = i64::try_from(state.config.context_window).unwrap_or(i64::MAX);
    let history = match state.conversations.recent(window).await {
        Ok(rows) => to_history(&rows),
        Err(e) => {
            tracing::warn!("chat: could not load conversation history: {}", e);
            Vec::new()
        }
    };

    let response = state.dispatcher.process_turn(message, &history).await;

    let conversation_id = match state.conversations.save(message, &response).await {
        Ok(saved) => saved.id,
        Err(e) => {
            tracing::warn!("chat: could not save conversation: {}", e);
            0
        }
    };

    Ok(Json(ChatResponse {
        response,
        conversation_id,
    }))
}

/// GET /api/conversations?limit=10 - newest first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationsQuery>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_CONVERSATIONS)
        .clamp(1, MAX_CONVERSATIONS);
    Ok(Json(state.conversations.recent(limit).await?))
}
