// Legacy free-text MCP query parser
//! Deprecated compatibility path: pulls an MCP action, server URL, tool name
//! and JSON arguments out of free text such as
//! `call_tool list_repositories with arguments {"owner":"acme"} on https://host/mcp/`.
//!
//! Pure; performs no I/O. The structured tool-call path never goes through
//! here.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:from|on|at|server)\s+(https?://\S+)").expect("valid url regex")
});

static TOOL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:call_tool|call tool)\s+([a-zA-Z_][a-zA-Z0-9_]*)").expect("valid tool regex")
});

// One level of nested braces, like the payloads models actually write.
static JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("valid json regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyAction {
    ListTools,
    CallTool {
        name: String,
        arguments: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRequest {
    pub action: LegacyAction,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LegacyParseError {
    #[error("Specify: list_tools or call_tool")]
    NoAction,
    #[error("No MCP server URL given and no default server configured")]
    NoServer,
    #[error("Tool name not found")]
    NoToolName,
    #[error("Could not parse JSON arguments: {0}")]
    BadArguments(String),
}

/// Parse one free-text query. `default_url` is used when the text names no
/// server.
pub fn parse_query(query: &str, default_url: Option<&str>) -> Result<LegacyRequest, LegacyParseError> {
    let lower = query.to_lowercase();

    let is_list = lower.contains("list_tools") || lower.contains("list tools");
    let is_call = lower.contains("call_tool") || lower.contains("call tool");

    let url = URL_RE
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | '!' | '?' | '"'))
                .to_string()
        })
        .or_else(|| default_url.map(String::from))
        .filter(|u| !u.is_empty());

    let action = if is_list {
        LegacyAction::ListTools
    } else if is_call {
        let name = TOOL_NAME_RE
            .captures(query)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(LegacyParseError::NoToolName)?;
        let arguments = match JSON_RE.find(query) {
            Some(m) => parse_json_flexible(m.as_str())?,
            None => Map::new(),
        };
        LegacyAction::CallTool { name, arguments }
    } else {
        return Err(LegacyParseError::NoAction);
    };

    let url = url.ok_or(LegacyParseError::NoServer)?;
    Ok(LegacyRequest { action, url })
}

/// Parse a JSON object, retrying once with single quotes swapped for double.
pub fn parse_json_flexible(raw: &str) -> Result<Map<String, Value>, LegacyParseError> {
    let parsed = serde_json::from_str::<Value>(raw).or_else(|_| {
        serde_json::from_str::<Value>(&raw.replace('\'', "\""))
            .map_err(|e| LegacyParseError::BadArguments(format!("{e} (original: {raw})")))
    })?;
    match parsed {
        Value::Object(map) => Ok(map),
        other => Err(LegacyParseError::BadArguments(format!("expected an object, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_tools_with_url() {
        let req = parse_query("list_tools from https://api.githubcopilot.com/mcp/", None).unwrap();
        assert_eq!(req.action, LegacyAction::ListTools);
        assert_eq!(req.url, "https://api.githubcopilot.com/mcp/");
    }

    #[test]
    fn call_tool_with_arguments() {
        let req = parse_query(
            r#"call_tool list_repositories with arguments {"owner":"username"} on https://h.example/mcp/."#,
            None,
        )
        .unwrap();
        assert_eq!(req.url, "https://h.example/mcp/");
        match req.action {
            LegacyAction::CallTool { name, arguments } => {
                assert_eq!(name, "list_repositories");
                assert_eq!(Value::Object(arguments), json!({"owner": "username"}));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn single_quoted_json_is_accepted() {
        let map = parse_json_flexible("{'owner': 'acme', 'page': 2}").unwrap();
        assert_eq!(map["owner"], "acme");
        assert_eq!(map["page"], 2);
    }

    #[test]
    fn nested_arguments() {
        let req = parse_query(r#"call tool update_cells {"range": {"a": 1}} at http://localhost:8129"#, None).unwrap();
        let LegacyAction::CallTool { arguments, .. } = req.action else {
            panic!("expected call");
        };
        assert_eq!(arguments["range"]["a"], 1);
    }

    #[test]
    fn default_url_is_used() {
        let req = parse_query("list tools please", Some("http://default/mcp")).unwrap();
        assert_eq!(req.url, "http://default/mcp");
    }

    #[test]
    fn explicit_failures() {
        assert_eq!(parse_query("hello there", Some("http://x")), Err(LegacyParseError::NoAction));
        assert_eq!(parse_query("list_tools", None), Err(LegacyParseError::NoServer));
        assert_eq!(parse_query("call_tool  ", Some("http://x")), Err(LegacyParseError::NoToolName));
        assert!(matches!(
            parse_query("call_tool x {not json} on http://h", None),
            Err(LegacyParseError::BadArguments(_))
        ));
    }
}
