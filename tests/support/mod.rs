// Shared test helpers: an in-process MCP server over HTTP and a scripted model.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use mcp_chat_backend::llm::{ChatMessage, ChatModel, ModelError, ModelTurn, ToolCall};
use mcp_chat_backend::tools::ToolSpec;

// ── Mock MCP server ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockConfig {
    /// `tools/list` entries.
    pub tools: Vec<Value>,
    /// Returned as `Mcp-Session-Id` on `initialize`.
    pub session_id: Option<String>,
    /// Status for every `initialize` (e.g. 401). `None` = 200.
    pub init_status: Option<u16>,
    pub init_delay: Option<Duration>,
    /// Answer `notifications/initialized` with a 500.
    pub fail_notification: bool,
    /// Delay before answering `tools/call`.
    pub call_delay: Option<Duration>,
    /// Frame replies as a single SSE event.
    pub sse: bool,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub id: Option<u64>,
    pub params: Value,
    pub session_header: Option<String>,
    pub authorization: Option<String>,
}

struct MockState {
    config: MockConfig,
    tools: Mutex<Vec<Value>>,
    requests: Mutex<Vec<RecordedRequest>>,
    expire_next: AtomicBool,
    fail_next: Mutex<Option<(StatusCode, String)>>,
}

pub struct MockMcpServer {
    pub url: String,
    state: Arc<MockState>,
}

impl MockMcpServer {
    pub async fn start(config: MockConfig) -> Self {
        let state = Arc::new(MockState {
            tools: Mutex::new(config.tools.clone()),
            config,
            requests: Mutex::new(Vec::new()),
            expire_next: AtomicBool::new(false),
            fail_next: Mutex::new(None),
        });
        let app = Router::new().route("/mcp", post(handle)).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/mcp"),
            state,
        }
    }

    pub async fn with_tools(names: &[&str]) -> Self {
        Self::start(MockConfig {
            tools: names.iter().map(|n| tool(n)).collect(),
            ..Default::default()
        })
        .await
    }

    /// The next `tools/list` or `tools/call` answers with a session error.
    pub fn expire_next_call(&self) {
        self.state.expire_next.store(true, Ordering::SeqCst);
    }

    /// The next `tools/list` or `tools/call` answers with `status` and a JSON `body`.
    pub fn fail_next_call(&self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap();
        *self.state.fail_next.lock().unwrap() = Some((status, body.to_string()));
    }

    /// Replace what `tools/list` returns from now on.
    pub fn set_tools(&self, names: &[&str]) {
        *self.state.tools.lock().unwrap() = names.iter().map(|n| tool(n)).collect();
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    /// Ids of every request other than `initialize` / notifications.
    pub fn call_ids(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .filter(|r| r.method != "initialize")
            .filter_map(|r| r.id)
            .collect()
    }
}

/// Listing entry with one required string property `owner` and an optional
/// string `repo`.
pub fn tool(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("The {name} tool"),
        "inputSchema": {
            "type": "object",
            "properties": {
                "owner": {"type": "string"},
                "repo": {"type": "string"}
            },
            "required": ["owner"]
        }
    })
}

async fn handle(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let id = body.get("id").and_then(|v| v.as_u64());
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        id,
        params: body.get("params").cloned().unwrap_or(Value::Null),
        session_header: header_str("mcp-session-id"),
        authorization: header_str("authorization"),
    });
    let config = &state.config;

    if matches!(method.as_str(), "tools/list" | "tools/call") {
        let failure = state.fail_next.lock().unwrap().take();
        if let Some((status, body)) = failure {
            return (status, [(header::CONTENT_TYPE, "application/json")], body).into_response();
        }
    }

    match method.as_str() {
        "initialize" => {
            if let Some(delay) = config.init_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(status) = config.init_status {
                let status = StatusCode::from_u16(status).unwrap();
                return (status, Json(json!({"error": {"message": "bad credentials"}}))).into_response();
            }
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {"name": "mock", "version": "0.1.0"},
                    "capabilities": {"tools": {}}
                }
            });
            let mut response = rpc_reply(config, reply);
            if let Some(sid) = &config.session_id {
                response.headers_mut().insert("mcp-session-id", sid.parse().unwrap());
            }
            response
        }
        "notifications/initialized" => {
            if config.fail_notification {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            } else {
                StatusCode::ACCEPTED.into_response()
            }
        }
        "tools/list" | "tools/call" if state.expire_next.swap(false, Ordering::SeqCst) => rpc_reply(
            config,
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32000, "message": "Bad session, please re-initialize"}
            }),
        ),
        "tools/list" => {
            let tools = state.tools.lock().unwrap().clone();
            rpc_reply(config, json!({"jsonrpc": "2.0", "id": id, "result": {"tools": tools}}))
        }
        "tools/call" => {
            if let Some(delay) = config.call_delay {
                tokio::time::sleep(delay).await;
            }
            let name = body["params"]["name"].as_str().unwrap_or_default();
            let arguments = &body["params"]["arguments"];
            let result = if name == "explode" {
                json!({"content": [{"type": "text", "text": "it exploded"}], "isError": true})
            } else {
                json!({"content": [{"type": "text", "text": format!("{name} called with {arguments}")}]})
            };
            rpc_reply(config, json!({"jsonrpc": "2.0", "id": id, "result": result}))
        }
        _ => rpc_reply(
            config,
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "Method not found"}}),
        ),
    }
}

fn rpc_reply(config: &MockConfig, reply: Value) -> Response {
    if config.sse {
        let body = format!("event: message\ndata: {reply}\n\n");
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    } else {
        Json(reply).into_response()
    }
}

// ── Scripted model ──────────────────────────────────────────────────────────

/// Returns queued turns in order, then empty text. Records every request.
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<Vec<ModelTurn>>,
    pub requests: Mutex<Vec<(Vec<ChatMessage>, Vec<ToolSpec>)>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ModelTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::new(vec![ModelTurn::Text(text.to_string())])
    }

    pub fn calls(calls: Vec<(&str, Value)>) -> Arc<Self> {
        Self::new(vec![ModelTurn::ToolCalls(
            calls
                .into_iter()
                .map(|(name, arguments)| ToolCall {
                    name: name.to_string(),
                    arguments,
                })
                .collect(),
        )])
    }

    pub fn last_catalog(&self) -> Vec<ToolSpec> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|(_, tools)| tools.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelTurn, ModelError> {
        self.requests.lock().unwrap().push((messages.to_vec(), tools.to_vec()));
        Ok(self
            .turns
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| ModelTurn::Text(String::new())))
    }
}
