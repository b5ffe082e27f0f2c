use serde::{Deserialize, Serialize};

use crate::tools::ToolSummary;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
    pub tools: usize,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// 0 when the exchange could not be saved.
    pub conversation_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Tools / MCP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ToolsResponse {
    pub count: usize,
    pub tools: Vec<ToolSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsClearedResponse {
    pub cleared: usize,
}
