// Chat model client
//! The model seam: `complete(messages, catalog) -> Text | ToolCalls`.
//!
//! [`OpenAiCompatModel`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint (Groq by default) with the tool catalog in `function` format.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::tools::ToolSpec;

const MODEL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A structured tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model API key is not configured (set LLM_API_KEY)")]
    MissingApiKey,
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected model response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelTurn, ModelError>;
}

pub struct OpenAiCompatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatModel {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            let declared: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(declared);
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelTurn, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(messages, tools))
            .timeout(MODEL_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let json: Value = resp.json().await?;
        parse_completion(&json)
    }
}

/// Read `choices[0].message`: tool calls win over content.
pub fn parse_completion(json: &Value) -> Result<ModelTurn, ModelError> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ModelError::InvalidResponse("missing choices[0].message".into()))?;

    if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
        let parsed: Vec<ToolCall> = calls.iter().filter_map(parse_tool_call).collect();
        if !parsed.is_empty() {
            return Ok(ModelTurn::ToolCalls(parsed));
        }
    }

    let text = message.get("content").and_then(|v| v.as_str()).unwrap_or_default();
    Ok(ModelTurn::Text(text.to_string()))
}

fn parse_tool_call(raw: &Value) -> Option<ToolCall> {
    let function = raw.get("function")?;
    let name = function.get("name")?.as_str()?.to_string();
    // Arguments arrive as a JSON string; tolerate an inline object too.
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) if s.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|e| {
            tracing::warn!("llm: unparseable arguments for '{}': {}", name, e);
            Value::String(s.clone())
        }),
        Some(v) => v.clone(),
        None => Value::Object(Map::new()),
    };
    Some(ToolCall { name, arguments })
}
