// MCP wire shapes
//! Tool descriptors from `tools/list` and content from `tools/call`.

use serde::Serialize;
use serde_json::{json, Value};

/// One parameter as declared in a tool's `inputSchema.properties`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredParam {
    pub name: String,
    /// Raw JSON Schema `type` tag; `None` when the schema omits it.
    pub type_tag: Option<String>,
    pub required: bool,
    pub description: Option<String>,
}

/// Immutable snapshot of one remote tool, as returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Ordered by property name.
    pub params: Vec<DeclaredParam>,
    /// `false` only when the schema says `"additionalProperties": false`.
    pub additional_properties: bool,
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Build from one element of `result.tools`. Returns `None` when the
    /// entry has no usable name.
    pub fn from_listing(raw: &Value) -> Option<Self> {
        let name = raw.get("name")?.as_str()?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let description = raw
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("No description")
            .to_string();
        let input_schema = raw
            .get("inputSchema")
            .filter(|s| s.is_object())
            .cloned()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

        let required: Vec<&str> = input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let params = input_schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(pname, schema)| DeclaredParam {
                        name: pname.clone(),
                        type_tag: type_tag_of(schema),
                        required: required.contains(&pname.as_str()),
                        description: schema
                            .get("description")
                            .and_then(|d| d.as_str())
                            .map(String::from),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let additional_properties = input_schema
            .get("additionalProperties")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        Some(Self {
            name,
            description,
            params,
            additional_properties,
            input_schema,
        })
    }
}

/// `"type": "string"` or `"type": ["string", "null"]` -> `"string"`.
fn type_tag_of(schema: &Value) -> Option<String> {
    match schema.get("type")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(tags) => tags
            .iter()
            .filter_map(|t| t.as_str())
            .find(|t| *t != "null")
            .map(String::from),
        _ => None,
    }
}

/// Parse `result.tools` of a `tools/list` reply.
pub fn parse_tool_list(result: &Value) -> Vec<ToolDescriptor> {
    result
        .get("tools")
        .and_then(|t| t.as_array())
        .map(|tools| {
            tools
                .iter()
                .filter_map(|raw| {
                    let parsed = ToolDescriptor::from_listing(raw);
                    if parsed.is_none() {
                        tracing::warn!("MCP: ignoring tool entry without a name: {}", raw);
                    }
                    parsed
                })
                .collect()
        })
        .unwrap_or_default()
}

// ── tools/call result ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(String),
    Image { mime_type: Option<String> },
    Audio { mime_type: Option<String> },
    Resource { uri: Option<String> },
    Other { kind: String },
}

impl ContentItem {
    fn from_value(raw: &Value) -> Self {
        let kind = raw.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
        let mime_type = || raw.get("mimeType").and_then(|m| m.as_str()).map(String::from);
        match kind {
            "text" => ContentItem::Text(
                raw.get("text").and_then(|t| t.as_str()).unwrap_or_default().to_string(),
            ),
            "image" => ContentItem::Image { mime_type: mime_type() },
            "audio" => ContentItem::Audio { mime_type: mime_type() },
            "resource" | "resource_link" => ContentItem::Resource {
                uri: raw
                    .pointer("/resource/uri")
                    .or_else(|| raw.get("uri"))
                    .and_then(|u| u.as_str())
                    .map(String::from),
            },
            other => ContentItem::Other { kind: other.to_string() },
        }
    }

    /// Short stand-in for content the chat cannot show inline.
    pub fn placeholder(&self) -> Option<String> {
        match self {
            ContentItem::Text(_) => None,
            ContentItem::Image { mime_type } => {
                Some(format!("[Image: {}]", mime_type.as_deref().unwrap_or("unknown type")))
            }
            ContentItem::Audio { mime_type } => {
                Some(format!("[Audio: {}]", mime_type.as_deref().unwrap_or("unknown type")))
            }
            ContentItem::Resource { uri } => {
                Some(format!("[Resource: {}]", uri.as_deref().unwrap_or("embedded")))
            }
            ContentItem::Other { kind } => Some(format!("[Unsupported content: {kind}]")),
        }
    }
}

/// Parsed `result` of a `tools/call` reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolCallResult {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn from_result(result: &Value) -> Self {
        let content = result
            .get("content")
            .and_then(|c| c.as_array())
            .map(|items| items.iter().map(ContentItem::from_value).collect())
            .unwrap_or_default();
        let is_error = result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false);
        Self { content, is_error }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ContentItem::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }
}
