// Remote tool proxy
//! A locally registered tool that forwards to a remote MCP server.

use std::sync::Arc;

use serde_json::Value;

use crate::mcp::schema::{translate, ArgumentContract};
use crate::mcp::{McpClient, ServerDescriptor, ServerEndpoint, SessionKey, ToolCallResult, ToolDescriptor};

use super::ToolError;

/// Max characters of text kept from one remote result.
const MAX_RESULT_CHARS: usize = 2000;

/// Remote tool bound to one server endpoint.
///
/// The contract is derived once here; re-registration builds a new proxy.
pub struct RemoteToolProxy {
    name: String,
    server: ServerDescriptor,
    endpoint: ServerEndpoint,
    descriptor: ToolDescriptor,
    contract: ArgumentContract,
    client: Arc<McpClient>,
}

impl RemoteToolProxy {
    pub fn new(
        server: ServerDescriptor,
        endpoint: ServerEndpoint,
        descriptor: ToolDescriptor,
        client: Arc<McpClient>,
    ) -> Self {
        Self {
            name: namespaced_name(&server.name, &descriptor.name),
            contract: translate(&descriptor),
            server,
            endpoint,
            descriptor,
            client,
        }
    }

    /// Registry name: `mcp_<server>_<tool>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool name as the remote server knows it.
    pub fn remote_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> String {
        format!("[MCP: {}] {}", self.server.name, self.descriptor.description)
    }

    pub fn server(&self) -> &ServerDescriptor {
        &self.server
    }

    pub fn server_key(&self) -> SessionKey {
        self.endpoint.key()
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn contract(&self) -> &ArgumentContract {
        &self.contract
    }

    /// Validate, send `tools/call`, render the reply as text.
    pub async fn call(&self, args: &Value) -> Result<String, ToolError> {
        let arguments = self.contract.validate(args)?;
        let result = self
            .client
            .call_tool(&self.endpoint, &self.descriptor.name, Value::Object(arguments))
            .await?;

        let text = render_result(&result);
        if result.is_error {
            return Err(ToolError::Execution(text));
        }
        Ok(text)
    }
}

/// First text item (truncated), followed by a placeholder line for every
/// non-text item.
pub fn render_result(result: &ToolCallResult) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(text) = result.first_text() {
        lines.push(truncate_chars(text, MAX_RESULT_CHARS));
    }
    lines.extend(result.content.iter().filter_map(|c| c.placeholder()));

    if lines.is_empty() {
        "Success (no output)".to_string()
    } else {
        lines.join("\n")
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n\n... (truncated)", &s[..cut]),
        None => s.to_string(),
    }
}

/// `mcp_<normalized server>_<tool>`.
pub fn namespaced_name(server: &str, tool: &str) -> String {
    format!("mcp_{}_{}", sanitize_server_name(server), tool)
}

/// Lower-case; runs of non-alphanumerics collapse to one `_`.
pub fn sanitize_server_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
        } else if !result.ends_with('_') {
            result.push('_');
        }
    }
    result.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_server_name() {
        assert_eq!(sanitize_server_name("my-server"), "my_server");
        assert_eq!(sanitize_server_name("My Server 2"), "my_server_2");
        assert_eq!(sanitize_server_name("a--b"), "a_b");
        assert_eq!(sanitize_server_name("simple"), "simple");
        assert_eq!(sanitize_server_name("UPPER"), "upper");
        assert_eq!(sanitize_server_name("(Google Sheets)"), "google_sheets");
    }

    #[test]
    fn namespacing() {
        assert_eq!(namespaced_name("Google Sheets", "get_sheet_data"), "mcp_google_sheets_get_sheet_data");
    }

    #[test]
    fn renders_first_text_and_placeholders() {
        let result = ToolCallResult::from_result(&json!({
            "content": [
                {"type": "text", "text": "rows: 3"},
                {"type": "image", "mimeType": "image/png"},
                {"type": "text", "text": "ignored"}
            ]
        }));
        assert_eq!(render_result(&result), "rows: 3\n[Image: image/png]");
    }

    #[test]
    fn empty_content_reports_success() {
        assert_eq!(render_result(&ToolCallResult::default()), "Success (no output)");
    }

    #[test]
    fn long_text_is_truncated() {
        let long = "x".repeat(MAX_RESULT_CHARS + 10);
        let result = ToolCallResult::from_result(&json!({"content": [{"type": "text", "text": long}]}));
        let out = render_result(&result);
        assert!(out.ends_with("... (truncated)"));
        assert!(out.len() < MAX_RESULT_CHARS + 30);
    }
}
