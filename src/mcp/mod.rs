// MCP bridge
//! MCP (Model Context Protocol) client side of the bridge.
//!
//! - `session`: one persistent, handshaken connection per (URL, header set).
//! - `client`: JSON-RPC 2.0 calls over a session, error classification.
//! - `schema`: tool input schema -> typed argument contract.
//! - `types`: `tools/list` / `tools/call` shapes.
//! - `config`: server descriptors, credentials, timeouts.
//! - `legacy`: deprecated free-text query parser.
//!
//! Protocol: JSON-RPC 2.0 over HTTP POST (no stdio transport).
//! Reference: <https://spec.modelcontextprotocol.io/2024-11-05/>

pub mod client;
pub mod config;
pub mod error;
pub mod legacy;
pub mod schema;
pub mod session;
pub mod types;

pub use client::McpClient;
pub use config::{McpCredentials, McpSettings, ServerDescriptor};
pub use error::McpError;
pub use session::{ServerEndpoint, Session, SessionKey, SessionManager, SessionState};
pub use types::{ToolCallResult, ToolDescriptor};
