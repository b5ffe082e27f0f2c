// backend/src/tools/mod.rs
//! Callable tools: local implementations and proxies to remote MCP tools,
//! unified behind [`RegisteredTool`].
//!
//! - `registry`: name -> tool map, built from local tools + `tools/list`
//! - `proxy`: remote tool proxy (validate, `tools/call`, render content)
//! - `email`: `read_emails` / `send_email`
//! - `universal_mcp`: legacy free-text MCP access

pub mod email;
pub mod proxy;
pub mod registry;
pub mod universal_mcp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::mcp::schema::ContractError;
use crate::mcp::McpError;

pub use proxy::RemoteToolProxy;
pub use registry::{load_remote, LoadReport, ToolRegistry};

/// Failure of a single tool call. Never aborts the conversation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] ContractError),

    #[error(transparent)]
    Remote(#[from] McpError),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Remote(e) if e.is_retryable())
    }
}

/// A tool implemented in-process.
#[async_trait]
pub trait LocalTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the arguments object.
    fn parameters(&self) -> Value;
    async fn call(&self, args: &Value) -> Result<String, ToolError>;
}

/// Catalog entry handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Name + description, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

#[derive(Clone)]
pub enum RegisteredTool {
    Local(Arc<dyn LocalTool>),
    Remote(Arc<RemoteToolProxy>),
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        match self {
            RegisteredTool::Local(t) => t.name(),
            RegisteredTool::Remote(p) => p.name(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            RegisteredTool::Local(t) => t.description().to_string(),
            RegisteredTool::Remote(p) => p.description(),
        }
    }

    pub fn spec(&self) -> ToolSpec {
        match self {
            RegisteredTool::Local(t) => ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            },
            RegisteredTool::Remote(p) => ToolSpec {
                name: p.name().to_string(),
                description: p.description(),
                parameters: p.contract().to_json_schema(),
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RegisteredTool::Remote(_))
    }

    pub async fn call(&self, args: &Value) -> Result<String, ToolError> {
        tracing::info!("tool: executing the {}... tool", self.name());
        match self {
            RegisteredTool::Local(t) => t.call(args).await,
            RegisteredTool::Remote(p) => p.call(args).await,
        }
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisteredTool::Local(t) => f.debug_tuple("Local").field(&t.name()).finish(),
            RegisteredTool::Remote(p) => f.debug_tuple("Remote").field(&p.name()).finish(),
        }
    }
}

/// Read a required string argument.
pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::Execution(format!("Missing required argument: {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retryable_only_for_remote_retryable() {
        assert!(ToolError::Remote(McpError::Timeout(Duration::from_secs(1))).is_retryable());
        assert!(!ToolError::Execution("boom".into()).is_retryable());
        assert!(!ToolError::Remote(McpError::Auth { status: 403, message: String::new() }).is_retryable());
    }

    #[test]
    fn require_str_reports_key() {
        let args = serde_json::json!({"query": "x", "n": 1});
        assert_eq!(require_str(&args, "query").unwrap(), "x");
        let err = require_str(&args, "n").unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument: n");
    }
}
