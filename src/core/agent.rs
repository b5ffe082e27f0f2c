use crate::mcp::ServerDescriptor;

/// One line per configured MCP server, as listed in the system prompt.
pub fn describe_server(server: &ServerDescriptor) -> String {
    format!(
        "- {} (prefix `mcp_{}_`): {} [{}]",
        server.name,
        crate::tools::proxy::sanitize_server_name(&server.name),
        server.description.as_deref().unwrap_or("N/A"),
        server.base_url
    )
}

pub fn build_system_prompt(servers: &[ServerDescriptor]) -> String {
    let server_list = if servers.is_empty() {
        "- (no MCP servers configured)".to_string()
    } else {
        servers.iter().map(describe_server).collect::<Vec<_>>().join("\n")
    };

    format!(
        r#"You are an intelligent assistant who helps users achieve their goals efficiently and clearly.

## Tools
- Local tools (`read_emails`, `send_email`) run directly in this service.
- Remote MCP tools are named `mcp_<server>_<tool>` and run on the servers listed below.
- `universal_mcp_tool` reaches any MCP server by free-text query; use it only when no `mcp_*` tool fits.

## Rules
- Call at most ONE tool per reply. Provide arguments as a JSON object matching the tool's schema.
- Decide whether a local or an MCP tool best fits the request; use the server descriptions to choose.
- Never expose raw JSON or API internals; summarize results clearly for the user.
- Remote MCP calls may take time. If a tool reports a failure, explain it briefly.

## MCP servers
{server_list}"#
    )
}
