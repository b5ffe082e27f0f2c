// Tool registry
//! Name -> callable map merging local tools with remote-tool proxies
//! materialized from each configured server's `tools/list`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::mcp::{McpClient, McpCredentials, McpError, ServerDescriptor};

use super::{LocalTool, RegisteredTool, RemoteToolProxy, ToolSpec, ToolSummary};

/// Outcome of loading remote tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub tools_loaded: usize,
    pub servers_loaded: usize,
    pub servers_failed: Vec<String>,
}

/// Ordered tool set: local tools first, then remote tools in server order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

/// ServerDescriptor identity: `(name, base_url)`.
fn same_server(a: &ServerDescriptor, b: &ServerDescriptor) -> bool {
    a.name == b.name && a.base_url == b.base_url
}

/// List one server's tools and build a proxy per tool. No registry lock is
/// needed while this runs.
pub async fn fetch_server_proxies(
    server: &ServerDescriptor,
    client: &Arc<McpClient>,
    credentials: &McpCredentials,
) -> Result<Vec<RemoteToolProxy>, McpError> {
    let endpoint = credentials.endpoint_for(&server.base_url);
    let descriptors = client.list_tools(&endpoint).await?;
    Ok(descriptors
        .into_iter()
        .map(|d| RemoteToolProxy::new(server.clone(), endpoint.clone(), d, client.clone()))
        .collect())
}

/// List every server and swap in its proxies. The write lock is taken only
/// for the swap, never across a network call.
pub async fn load_remote(
    registry: &RwLock<ToolRegistry>,
    servers: &[ServerDescriptor],
    client: &Arc<McpClient>,
    credentials: &McpCredentials,
) -> LoadReport {
    let mut report = LoadReport::default();
    for server in servers {
        match fetch_server_proxies(server, client, credentials).await {
            Ok(proxies) => {
                let added = registry.write().await.replace_server(server, proxies);
                tracing::info!("MCP: loaded {} tool(s) from '{}'", added, server.name);
                report.tools_loaded += added;
                report.servers_loaded += 1;
            }
            Err(e) => {
                tracing::warn!(
                    kind = e.kind(),
                    "MCP: failed to list tools from '{}' ({}): {}",
                    server.name,
                    server.base_url,
                    e
                );
                report.servers_failed.push(server.name.clone());
            }
        }
    }
    tracing::info!(
        "MCP: {} remote tool(s) loaded from {} of {} server(s)",
        report.tools_loaded,
        report.servers_loaded,
        servers.len()
    );
    report
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_tools(local: Vec<Arc<dyn LocalTool>>) -> Self {
        let mut registry = Self::new();
        for tool in local {
            registry.register_local(tool);
        }
        registry
    }

    /// Local tools plus every server's remote tools. A server whose listing
    /// fails is skipped.
    pub async fn build(
        local: Vec<Arc<dyn LocalTool>>,
        servers: &[ServerDescriptor],
        client: &Arc<McpClient>,
        credentials: &McpCredentials,
    ) -> (Self, LoadReport) {
        let registry = RwLock::new(Self::with_local_tools(local));
        let report = load_remote(&registry, servers, client, credentials).await;
        (registry.into_inner(), report)
    }

    /// Re-list one server and swap its proxies. On failure the old proxies
    /// stay registered.
    pub async fn refresh_server(
        &mut self,
        server: &ServerDescriptor,
        client: &Arc<McpClient>,
        credentials: &McpCredentials,
    ) -> Result<usize, McpError> {
        let proxies = fetch_server_proxies(server, client, credentials).await?;
        Ok(self.replace_server(server, proxies))
    }

    /// Register (or replace) a local tool.
    pub fn register_local(&mut self, tool: Arc<dyn LocalTool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = RegisteredTool::Local(tool),
            None => self.push(RegisteredTool::Local(tool)),
        }
    }

    /// Drop every proxy of `server` (same name and base URL) and insert
    /// `proxies` in their place. Returns how many were registered.
    pub fn replace_server(&mut self, server: &ServerDescriptor, proxies: Vec<RemoteToolProxy>) -> usize {
        self.tools.retain(|t| match t {
            RegisteredTool::Remote(p) => !same_server(p.server(), server),
            RegisteredTool::Local(_) => true,
        });
        self.reindex();

        let mut added = 0;
        for proxy in proxies {
            if let Some(existing) = self.lookup(proxy.name()) {
                tracing::warn!(
                    "MCP: '{}' from '{}' collides with an existing {} tool, skipping",
                    proxy.name(),
                    server.name,
                    if existing.is_remote() { "remote" } else { "local" }
                );
                continue;
            }
            self.push(RegisteredTool::Remote(Arc::new(proxy)));
            added += 1;
        }
        added
    }

    fn push(&mut self, tool: RegisteredTool) {
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
    }

    fn reindex(&mut self) {
        self.index = self
            .tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();
    }

    pub fn lookup(&self, name: &str) -> Option<RegisteredTool> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(RegisteredTool::spec).collect()
    }

    pub fn summaries(&self) -> Vec<ToolSummary> {
        self.tools
            .iter()
            .map(|t| ToolSummary {
                name: t.name().to_string(),
                description: t.description(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn remote_count(&self) -> usize {
        self.tools.iter().filter(|t| t.is_remote()).count()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
