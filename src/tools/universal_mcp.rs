// Legacy free-text MCP tool
//! `universal_mcp_tool`: lets the model reach any MCP server with a query like
//! `list_tools from https://host/mcp/`. Kept for prompts written against the
//! old interface; the structured `mcp_*` proxies are the primary path.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::mcp::legacy::{parse_query, LegacyAction};
use crate::mcp::{McpClient, McpCredentials, McpError, ToolDescriptor};

use super::proxy::render_result;
use super::{require_str, LocalTool, ToolError};

const MAX_LISTED_TOOLS: usize = 20;
const MAX_LISTED_PARAMS: usize = 5;
const MAX_DESCRIPTION_CHARS: usize = 100;

pub struct UniversalMcpTool {
    client: Arc<McpClient>,
    credentials: McpCredentials,
    default_url: Option<String>,
}

impl UniversalMcpTool {
    pub fn new(client: Arc<McpClient>, credentials: McpCredentials, default_url: Option<String>) -> Self {
        Self {
            client,
            credentials,
            default_url,
        }
    }
}

#[async_trait]
impl LocalTool for UniversalMcpTool {
    fn name(&self) -> &str {
        "universal_mcp_tool"
    }

    fn description(&self) -> &str {
        "Interact with any MCP server by free-text query. Examples: \
         \"list_tools from https://api.githubcopilot.com/mcp/\", \
         \"call_tool list_repositories with arguments {\\\"owner\\\":\\\"username\\\"} on https://api.githubcopilot.com/mcp/\""
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "list_tools or call_tool <name> [JSON arguments], plus 'from|on|at <url>'"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: &Value) -> Result<String, ToolError> {
        let query = require_str(args, "query")?;
        let request = parse_query(query, self.default_url.as_deref())
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let endpoint = self.credentials.endpoint_for(&request.url);
        tracing::info!(url = %endpoint.url, "MCP: legacy query {:?}", request.action);

        match request.action {
            LegacyAction::ListTools => {
                let tools = self.client.list_tools(&endpoint).await.map_err(connect_hint)?;
                Ok(format_tool_list(&tools))
            }
            LegacyAction::CallTool { name, arguments } => {
                let result = self
                    .client
                    .call_tool(&endpoint, &name, Value::Object(arguments))
                    .await
                    .map_err(connect_hint)?;
                let text = render_result(&result);
                if result.is_error {
                    return Err(ToolError::Execution(text));
                }
                Ok(text)
            }
        }
    }
}

fn connect_hint(e: McpError) -> ToolError {
    match e {
        McpError::Connect { url, message } => ToolError::Execution(format!(
            "Failed to connect to MCP server at {url}\n\nError: {message}\n\n\
             Troubleshooting:\n- Verify the URL is correct\n- Check GITHUB_TOKEN (GitHub MCP) or MCP_AUTH_TOKEN"
        )),
        other => ToolError::Remote(other),
    }
}

/// Numbered list of at most 20 tools with their first parameters.
pub fn format_tool_list(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "📋 No tools available".to_string();
    }

    let mut out = format!("🔧 {} Available Tools:\n\n", tools.len());
    for (i, tool) in tools.iter().take(MAX_LISTED_TOOLS).enumerate() {
        let description: String = tool.description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        out.push_str(&format!("{}. {}\n   {}\n", i + 1, tool.name, description));
        if !tool.params.is_empty() {
            let names: Vec<&str> = tool
                .params
                .iter()
                .take(MAX_LISTED_PARAMS)
                .map(|p| p.name.as_str())
                .collect();
            out.push_str(&format!("   📥 {}\n", names.join(", ")));
        }
        out.push('\n');
    }
    if tools.len() > MAX_LISTED_TOOLS {
        out.push_str(&format!("... and {} more tools\n", tools.len() - MAX_LISTED_TOOLS));
    }
    out
}
