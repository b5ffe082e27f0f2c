// Dispatch loop
//! One inbound message -> one model turn -> at most one tool call.
//!
//! Stateless between invocations: history comes from the caller, sessions
//! live in the process-wide `SessionManager`.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::llm::{ChatMessage, ChatModel, ModelTurn, ToolCall};
use crate::tools::{ToolRegistry, ToolSummary};

/// Max tool names quoted in the "not available" reply.
const MAX_KNOWN_NAMES: usize = 10;

pub struct Dispatcher {
    model: Arc<dyn ChatModel>,
    registry: Arc<RwLock<ToolRegistry>>,
    system_prompt: String,
    context_window: usize,
}

impl Dispatcher {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: Arc<RwLock<ToolRegistry>>,
        system_prompt: String,
        context_window: usize,
    ) -> Self {
        Self {
            model,
            registry,
            system_prompt,
            context_window,
        }
    }

    pub fn registry(&self) -> &Arc<RwLock<ToolRegistry>> {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn list_tools(&self) -> Vec<ToolSummary> {
        self.registry.read().await.summaries()
    }

    /// Produce the reply text for `user_text`. Never fails: model and tool
    /// errors come back as marked failure strings.
    pub async fn process_turn(&self, user_text: &str, prior_turns: &[ChatMessage]) -> String {
        let messages = self.build_messages(user_text, prior_turns);
        let catalog = self.registry.read().await.catalog();

        tracing::debug!(
            history = messages.len() - 2,
            tools = catalog.len(),
            "dispatch: requesting model turn"
        );

        match self.model.complete(&messages, &catalog).await {
            Ok(ModelTurn::Text(text)) => text,
            Ok(ModelTurn::ToolCalls(calls)) => self.run_first_call(calls).await,
            Err(e) => {
                tracing::error!("dispatch: model call failed: {}", e);
                format!("❌ Error during execution: {e}")
            }
        }
    }

    fn build_messages(&self, user_text: &str, prior_turns: &[ChatMessage]) -> Vec<ChatMessage> {
        let keep = self.context_window * 2;
        let history = &prior_turns[prior_turns.len().saturating_sub(keep)..];

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(user_text));
        messages
    }

    // One tool call per turn; the rest are dropped.
    async fn run_first_call(&self, calls: Vec<ToolCall>) -> String {
        if calls.len() > 1 {
            let ignored: Vec<&str> = calls[1..].iter().map(|c| c.name.as_str()).collect();
            tracing::warn!(
                "dispatch: model requested {} tool calls, running only '{}' (ignored: {})",
                calls.len(),
                calls[0].name,
                ignored.join(", ")
            );
        }
        match calls.into_iter().next() {
            Some(call) => self.execute_call(&call).await,
            None => String::new(),
        }
    }

    /// Look up and run a single tool call, folding any failure into the
    /// returned text.
    pub async fn execute_call(&self, call: &ToolCall) -> String {
        let tool = self.registry.read().await.lookup(&call.name);
        let Some(tool) = tool else {
            tracing::warn!("dispatch: model requested unknown tool '{}'", call.name);
            return self.not_available(&call.name).await;
        };

        match tool.call(&call.arguments).await {
            Ok(output) => output,
            Err(e) => {
                let retryable = e.is_retryable();
                tracing::warn!(tool = %call.name, retryable, "dispatch: tool call failed: {}", e);
                let mut msg = format!("❌ Tool '{}' failed: {}", call.name, e);
                if retryable {
                    msg.push_str("\n\nThis looks transient; retrying may succeed.");
                }
                msg
            }
        }
    }

    async fn not_available(&self, name: &str) -> String {
        let registry = self.registry.read().await;
        let names = registry.names();
        let mut known = names.iter().take(MAX_KNOWN_NAMES).copied().collect::<Vec<_>>().join(", ");
        if names.len() > MAX_KNOWN_NAMES {
            known.push_str(&format!(", ... ({} more)", names.len() - MAX_KNOWN_NAMES));
        }
        if known.is_empty() {
            known.push_str("none");
        }
        format!("❌ Tool '{name}' is not available. Available tools: {known}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelError;
    use crate::tools::{LocalTool, ToolError, ToolSpec};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Returns a fixed turn and records what it was shown.
    struct Scripted {
        turn: Mutex<Option<Result<ModelTurn, ModelError>>>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl Scripted {
        fn new(turn: Result<ModelTurn, ModelError>) -> Arc<Self> {
            Arc::new(Self {
                turn: Mutex::new(Some(turn)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ModelTurn, ModelError> {
            *self.seen.lock().unwrap() = messages.to_vec();
            self.turn
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(ModelTurn::Text(String::new())))
        }
    }

    struct Failing;

    #[async_trait]
    impl LocalTool for Failing {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _args: &Value) -> Result<String, ToolError> {
            Err(ToolError::Execution("disk on fire".into()))
        }
    }

    fn dispatcher(model: Arc<Scripted>, window: usize) -> Dispatcher {
        let registry = ToolRegistry::with_local_tools(vec![Arc::new(Failing)]);
        Dispatcher::new(model, Arc::new(RwLock::new(registry)), "sys".into(), window)
    }

    #[tokio::test]
    async fn history_is_trimmed_to_window() {
        let model = Scripted::new(Ok(ModelTurn::Text("ok".into())));
        let d = dispatcher(model.clone(), 1);
        let history: Vec<_> = (0..5).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        assert_eq!(d.process_turn("now", &history).await, "ok");

        let seen = model.seen.lock().unwrap();
        let contents: Vec<&str> = seen.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "m3", "m4", "now"]);
    }

    #[tokio::test]
    async fn tool_failure_is_marked() {
        let model = Scripted::new(Ok(ModelTurn::ToolCalls(vec![ToolCall {
            name: "broken".into(),
            arguments: json!({}),
        }])));
        let out = dispatcher(model, 5).process_turn("go", &[]).await;
        assert_eq!(out, "❌ Tool 'broken' failed: disk on fire");
    }

    #[tokio::test]
    async fn unknown_tool_lists_known_names() {
        let model = Scripted::new(Ok(ModelTurn::ToolCalls(vec![ToolCall {
            name: "nope".into(),
            arguments: json!({}),
        }])));
        let out = dispatcher(model, 5).process_turn("go", &[]).await;
        assert_eq!(out, "❌ Tool 'nope' is not available. Available tools: broken");
    }

    #[tokio::test]
    async fn model_error_is_marked() {
        let model = Scripted::new(Err(ModelError::MissingApiKey));
        let out = dispatcher(model, 5).process_turn("go", &[]).await;
        assert!(out.starts_with("❌ Error during execution: model API key"));
    }
}
