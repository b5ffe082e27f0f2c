// MCP server configuration
//! Server descriptors, credential selection and transport timeouts.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::session::ServerEndpoint;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// One remote MCP server, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ServerDescriptor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            description: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServersFile {
    #[serde(default)]
    mcp_servers: Vec<ServerDescriptor>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServersFileError {
    #[error("cannot read MCP servers file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP servers file '{path}' is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse `{"mcp_servers": [{name, base_url, description?}, ...]}`.
///
/// Entries with an empty name or a base URL that is not http(s) are dropped
/// with a warning.
pub fn parse_server_descriptors(json: &str) -> Result<Vec<ServerDescriptor>, serde_json::Error> {
    let file: ServersFile = serde_json::from_str(json)?;
    Ok(file
        .mcp_servers
        .into_iter()
        .filter(|s| {
            let url_ok = url::Url::parse(s.base_url.trim())
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            let ok = !s.name.trim().is_empty() && url_ok;
            if !ok {
                tracing::warn!("MCP: skipping server entry with empty name or invalid base_url: {:?}", s);
            }
            ok
        })
        .collect())
}

pub fn load_server_descriptors(path: &Path) -> Result<Vec<ServerDescriptor>, ServersFileError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ServersFileError::Read {
        path: display.clone(),
        source,
    })?;
    parse_server_descriptors(&raw).map_err(|source| ServersFileError::Parse {
        path: display,
        source,
    })
}

// ── Credentials ─────────────────────────────────────────────────────────────

/// Tokens used to build the `Authorization` header for a target URL.
#[derive(Debug, Clone, Default)]
pub struct McpCredentials {
    /// Sent as `Bearer <token>` to GitHub / Copilot hosted servers.
    pub github_token: Option<String>,
    /// Sent verbatim to every other server.
    pub auth_token: Option<String>,
}

impl McpCredentials {
    /// Pick the `Authorization` value for `url` by matching provider hints.
    pub fn authorization_for(&self, url: &str) -> Option<String> {
        let lower = url.to_lowercase();
        match (&self.github_token, &self.auth_token) {
            (Some(token), _) if lower.contains("github") || lower.contains("copilot") => {
                Some(format!("Bearer {token}"))
            }
            (_, Some(token)) => Some(token.clone()),
            _ => None,
        }
    }

    pub fn endpoint_for(&self, url: &str) -> ServerEndpoint {
        let mut headers = BTreeMap::new();
        if let Some(auth) = self.authorization_for(url) {
            headers.insert("authorization".to_string(), auth);
        }
        ServerEndpoint::with_headers(url, headers)
    }
}

// ── Timeouts / client identity ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct McpSettings {
    /// Deadline for `tools/list`, `tools/call` and other regular calls.
    pub call_timeout: Duration,
    /// Deadline for the `initialize` handshake.
    pub init_timeout: Duration,
    /// Deadline for the best-effort `notifications/initialized`.
    pub notify_timeout: Duration,
    pub client_name: String,
    pub client_version: String,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            init_timeout: Duration::from_secs(15),
            notify_timeout: Duration::from_secs(5),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
