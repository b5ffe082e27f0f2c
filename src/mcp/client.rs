// MCP client
//! JSON-RPC 2.0 over HTTP: the `initialize` handshake, request/response
//! correlation and error classification.
//!
//! Sessions come from the [`SessionManager`]; every public operation re-fetches
//! its session so an invalidation by one caller is seen by the next.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use super::config::{McpSettings, PROTOCOL_VERSION};
use super::error::McpError;
use super::session::{HttpReply, Negotiated, ServerEndpoint, Session, SessionManager, SessionState};
use super::types::{parse_tool_list, ToolCallResult, ToolDescriptor};

// ── Handshake ───────────────────────────────────────────────────────────────

/// Run `initialize` + `notifications/initialized` on a fresh session.
///
/// Any failure leaves the session `Failed` and is reported as
/// [`McpError::Connect`] (or [`McpError::Auth`] for 401/403).
pub(crate) async fn initialize(session: &Session, settings: &McpSettings) -> Result<(), McpError> {
    session.set_state(SessionState::Initializing);
    let fail = |message: String| {
        session.set_state(SessionState::Failed);
        McpError::Connect {
            url: session.url().to_string(),
            message,
        }
    };

    let id = session.next_request_id();
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "roots": { "listChanged": true },
                "sampling": {}
            },
            "clientInfo": {
                "name": settings.client_name,
                "version": settings.client_version
            }
        }
    });

    tracing::debug!("MCP: sending initialize to {}", session.url());
    let reply = session
        .post(&body, settings.init_timeout)
        .await
        .map_err(|e| {
            if e.is_timeout() {
                fail("Connection timeout".to_string())
            } else {
                fail(format!("Connection failed: {e}"))
            }
        })?;

    if matches!(reply.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        session.set_state(SessionState::Failed);
        return Err(McpError::Auth {
            status: reply.status.as_u16(),
            message: error_message_from_body(&reply.body),
        });
    }
    if !reply.status.is_success() {
        return Err(fail(format!(
            "HTTP {}: {}",
            reply.status.as_u16(),
            truncate_str(&reply.body, 500)
        )));
    }

    let json = parse_reply_body(&reply).map_err(|e| fail(format!("Invalid JSON response: {e}")))?;
    if let Some(error) = json.get("error") {
        return Err(fail(format!("Initialize error: {}", rpc_error_parts(error).1)));
    }

    let result = json.get("result").cloned().unwrap_or_else(|| json!({}));
    let session_id = result
        .get("sessionId")
        .or_else(|| result.get("session_id"))
        .and_then(|v| v.as_str())
        .map(String::from)
        .or(reply.session_id);

    let negotiated = Negotiated {
        session_id,
        protocol_version: result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .map(String::from),
        server_info: result.get("serverInfo").cloned().unwrap_or_else(|| json!({})),
        capabilities: result.get("capabilities").cloned().unwrap_or_else(|| json!({})),
    };
    let server_name = negotiated
        .server_info
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    session.set_negotiated(negotiated);

    // Best effort: some servers reject or ignore the notification.
    let notify = json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized",
        "params": {}
    });
    match session.post(&notify, settings.notify_timeout).await {
        Ok(r) => tracing::debug!("MCP: initialized notification sent (status: {})", r.status),
        Err(e) => tracing::debug!("MCP: initialized notification skipped: {}", e),
    }

    session.mark_ready();
    tracing::info!(
        "MCP: session initialized for {} (server: {}, sessionId: {})",
        session.url(),
        server_name,
        session.session_id().unwrap_or("none")
    );
    Ok(())
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Sends JSON-RPC requests to MCP servers through cached sessions.
pub struct McpClient {
    sessions: Arc<SessionManager>,
}

impl McpClient {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Send one request on `session` and return its `result`.
    pub async fn call(&self, session: &Arc<Session>, method: &str, params: Value) -> Result<Value, McpError> {
        if !session.is_ready() {
            return Err(McpError::SessionExpired {
                message: format!("session for {} is closed", session.url()),
            });
        }

        let timeout = self.sessions.settings().call_timeout;
        let id = session.next_request_id();
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        tracing::debug!("MCP: sending {} (id={}) to {}", method, id, session.url());
        let reply = match session.post(&body, timeout).await {
            Ok(reply) => reply,
            Err(e) if e.is_timeout() => {
                tracing::warn!("MCP: {} (id={}) timed out after {}s", method, id, timeout.as_secs());
                return Err(McpError::Timeout(timeout));
            }
            Err(e) => {
                tracing::warn!("MCP: transport failure on {}: {}", session.url(), e);
                self.sessions.invalidate_session(session).await;
                return Err(McpError::Transport(e.to_string()));
            }
        };

        if matches!(reply.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(McpError::Auth {
                status: reply.status.as_u16(),
                message: error_message_from_body(&reply.body),
            });
        }

        if !reply.status.is_success() {
            let parsed = parse_reply_body(&reply).ok();
            let rpc_error = parsed.as_ref().and_then(|j| j.get("error")).map(rpc_error_parts);
            let message = rpc_error
                .as_ref()
                .map(|(_, m)| m.clone())
                .unwrap_or_else(|| truncate_str(&reply.body, 300));

            if looks_like_session_loss(&message) {
                return Err(self.expire(session, message).await);
            }
            return Err(match rpc_error {
                Some((code, message)) => McpError::Protocol { code, message },
                None => McpError::Transport(format!("HTTP {}: {}", reply.status.as_u16(), message)),
            });
        }

        let json = parse_reply_body(&reply).map_err(McpError::InvalidResponse)?;

        if let Some(error) = json.get("error") {
            let (code, message) = rpc_error_parts(error);
            if looks_like_session_loss(&message) {
                return Err(self.expire(session, message).await);
            }
            return Err(McpError::Protocol { code, message });
        }

        match json.get("id") {
            Some(reply_id) if !id_matches(reply_id, id) => {
                return Err(McpError::InvalidResponse(format!(
                    "reply id {reply_id} does not match request id {id}"
                )));
            }
            _ => {}
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| McpError::InvalidResponse(format!("{method} reply has no result")))
    }

    /// Session loss on one server clears the whole cache; every server
    /// re-handshakes on its next call.
    async fn expire(&self, session: &Arc<Session>, message: String) -> McpError {
        tracing::warn!(
            "MCP: server message looks like session loss on {}, clearing all sessions: {}",
            session.key(),
            message
        );
        session.close();
        self.sessions.invalidate_all().await;
        McpError::SessionExpired { message }
    }

    /// Fetch (or create) the session for `endpoint` and send one request.
    pub async fn request(&self, endpoint: &ServerEndpoint, method: &str, params: Value) -> Result<Value, McpError> {
        let session = self.sessions.get_or_create(endpoint).await?;
        self.call(&session, method, params).await
    }

    /// `tools/list`.
    pub async fn list_tools(&self, endpoint: &ServerEndpoint) -> Result<Vec<ToolDescriptor>, McpError> {
        let result = self.request(endpoint, "tools/list", json!({})).await?;
        Ok(parse_tool_list(&result))
    }

    /// `tools/call` with `{name, arguments}`.
    pub async fn call_tool(
        &self,
        endpoint: &ServerEndpoint,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        tracing::info!("MCP: calling '{}' on {}", name, endpoint.url);
        let result = self
            .request(endpoint, "tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(ToolCallResult::from_result(&result))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Heuristic session-loss detector. There is no protocol-level signal for an
/// expired session, so any error text mentioning "session" counts.
pub fn looks_like_session_loss(message: &str) -> bool {
    message.to_lowercase().contains("session")
}

/// Decode a reply body. Streamable-HTTP servers may answer with a single SSE
/// event; in that case the last `data:` payload that parses as JSON wins.
pub(crate) fn parse_reply_body(reply: &HttpReply) -> Result<Value, String> {
    if reply.content_type.contains("text/event-stream") {
        return parse_sse_payload(&reply.body)
            .ok_or_else(|| format!("no JSON data event in stream: {}", truncate_str(&reply.body, 300)));
    }
    serde_json::from_str(&reply.body)
        .map_err(|e| format!("{e}: {}", truncate_str(&reply.body, 300)))
}

fn parse_sse_payload(body: &str) -> Option<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .last()
}

/// `(code, message)` of a JSON-RPC error object.
fn rpc_error_parts(error: &Value) -> (i64, String) {
    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(String::from)
        .unwrap_or_else(|| error.to_string());
    (code, message)
}

fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|j| j.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| truncate_str(body, 300))
}

fn id_matches(reply_id: &Value, id: u64) -> bool {
    match reply_id {
        Value::Number(n) => n.as_u64() == Some(id),
        Value::String(s) => s.parse::<u64>().ok() == Some(id),
        // Some servers answer with `null` ids; nothing to correlate against.
        Value::Null => true,
        _ => false,
    }
}

pub(crate) fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_len);
        format!("{}...", &s[..boundary])
    }
}
