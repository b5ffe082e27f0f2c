// Bridge error taxonomy
//! Errors raised by the MCP session layer and client.

use std::time::Duration;

/// Every failure the bridge can report for one server interaction.
///
/// Only [`McpError::SessionExpired`] and [`McpError::Timeout`] are worth a
/// single caller-initiated retry; everything else is terminal for the turn.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Handshake or transport failure before a usable session existed.
    #[error("failed to connect to MCP server at {url}: {message}")]
    Connect { url: String, message: String },

    /// HTTP 401 / 403 from the server.
    #[error("MCP server rejected credentials (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// The server answered with a JSON-RPC `error` object.
    #[error("MCP error [{code}]: {message}")]
    Protocol { code: i64, message: String },

    /// The server reported a lost session. The session has already been
    /// invalidated; the next call re-handshakes.
    #[error("MCP session expired: {message}")]
    SessionExpired { message: String },

    /// No reply within the call deadline. The session stays cached.
    #[error("MCP request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The network failed mid-call.
    #[error("MCP transport error: {0}")]
    Transport(String),

    /// A reply arrived but could not be understood.
    #[error("invalid MCP response: {0}")]
    InvalidResponse(String),
}

impl McpError {
    /// Whether a caller-initiated retry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, McpError::SessionExpired { .. } | McpError::Timeout(_))
    }

    /// Machine-readable kind, used in logs and failure messages.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Connect { .. } => "CONNECT",
            McpError::Auth { .. } => "AUTH",
            McpError::Protocol { .. } => "PROTOCOL",
            McpError::SessionExpired { .. } => "SESSION_EXPIRED",
            McpError::Timeout(_) => "TIMEOUT",
            McpError::Transport(_) => "TRANSPORT",
            McpError::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_expiry_and_timeout_are_retryable() {
        assert!(McpError::SessionExpired { message: "gone".into() }.is_retryable());
        assert!(McpError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!McpError::Auth { status: 401, message: String::new() }.is_retryable());
        assert!(!McpError::Protocol { code: -32601, message: "nope".into() }.is_retryable());
        assert!(!McpError::Connect { url: "u".into(), message: "m".into() }.is_retryable());
    }

    #[test]
    fn display_keeps_server_code_and_message() {
        let err = McpError::Protocol { code: -32602, message: "Invalid params".into() };
        assert_eq!(err.to_string(), "MCP error [-32602]: Invalid params");
        assert_eq!(McpError::Timeout(Duration::from_secs(30)).to_string(), "MCP request timed out after 30s");
    }
}
