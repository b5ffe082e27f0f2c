// Application state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::conversations::ConversationStore;
use crate::core::agent::build_system_prompt;
use crate::core::dispatch::Dispatcher;
use crate::llm::ChatModel;
use crate::mcp::{McpClient, ServerDescriptor, SessionManager};
use crate::tools::email::{Mailbox, ReadEmailsTool, SendEmailTool};
use crate::tools::universal_mcp::UniversalMcpTool;
use crate::tools::{load_remote, LoadReport, LocalTool, ToolRegistry};

/// Central application state. Clone-friendly (all inner fields are Arc-wrapped).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<RwLock<ToolRegistry>>,
    pub mcp: Arc<McpClient>,
    pub servers: Arc<Vec<ServerDescriptor>>,
    pub conversations: Arc<dyn ConversationStore>,
    pub start_time: Instant,
    pub auth_secret: Option<String>,
    /// `true` once the first remote tool load has finished.
    ready: Arc<AtomicBool>,
}

impl AppState {
    /// Wire the bridge with local tools only; remote tools are added by
    /// [`AppState::refresh_tools`].
    pub fn new(
        config: AppConfig,
        model: Arc<dyn ChatModel>,
        conversations: Arc<dyn ConversationStore>,
        mailbox: Arc<dyn Mailbox>,
        servers: Vec<ServerDescriptor>,
    ) -> Self {
        let mcp = Arc::new(McpClient::new(Arc::new(SessionManager::new(config.mcp.clone()))));

        let local: Vec<Arc<dyn LocalTool>> = vec![
            Arc::new(ReadEmailsTool::new(mailbox.clone())),
            Arc::new(SendEmailTool::new(mailbox)),
            Arc::new(UniversalMcpTool::new(
                mcp.clone(),
                config.credentials.clone(),
                config.mcp_default_url.clone(),
            )),
        ];
        let registry = Arc::new(RwLock::new(ToolRegistry::with_local_tools(local)));

        let dispatcher = Arc::new(Dispatcher::new(
            model,
            registry.clone(),
            build_system_prompt(&servers),
            config.context_window,
        ));

        Self {
            auth_secret: config.auth_secret.clone(),
            config: Arc::new(config),
            dispatcher,
            registry,
            mcp,
            servers: Arc::new(servers),
            conversations,
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Re-list every configured server and swap in its tools.
    pub async fn refresh_tools(&self) -> LoadReport {
        load_remote(&self.registry, &self.servers, &self.mcp, &self.config.credentials).await
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("Backend marked as READY");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}
