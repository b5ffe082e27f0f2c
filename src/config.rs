// Application configuration
//! Read once at startup from the environment (after `dotenvy`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::mcp::{McpCredentials, McpSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Mail credentials. Only checked at startup: no mailbox transport is wired.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub address: Option<String>,
    pub password: Option<String>,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.address.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm_api_key: Option<String>,
    pub model_name: String,
    pub model_base_url: String,
    pub context_window: usize,
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub mcp_servers_file: PathBuf,
    /// Default server for the legacy free-text tool.
    pub mcp_default_url: Option<String>,
    pub credentials: McpCredentials,
    pub mcp: McpSettings,
    pub auth_secret: Option<String>,
    pub email: EmailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            model_name: "llama-3.1-8b-instant".to_string(),
            model_base_url: "https://api.groq.com/openai/v1".to_string(),
            context_window: 5,
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: None,
            mcp_servers_file: PathBuf::from("mcp_servers.json"),
            mcp_default_url: None,
            credentials: McpCredentials::default(),
            mcp: McpSettings::default(),
            auth_secret: None,
            email: EmailConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let model_base_url = get("MODEL_BASE_URL").unwrap_or(defaults.model_base_url);
        if let Err(e) = url::Url::parse(&model_base_url) {
            return Err(ConfigError::Invalid {
                key: "MODEL_BASE_URL",
                value: model_base_url,
                reason: e.to_string(),
            });
        }

        let secs = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parsed::<u64>(key, get(key))?.map(Duration::from_secs).unwrap_or(default))
        };
        let mcp = McpSettings {
            call_timeout: secs("MCP_CALL_TIMEOUT_SECS", defaults.mcp.call_timeout)?,
            init_timeout: secs("MCP_INIT_TIMEOUT_SECS", defaults.mcp.init_timeout)?,
            notify_timeout: secs("MCP_NOTIFY_TIMEOUT_SECS", defaults.mcp.notify_timeout)?,
            ..defaults.mcp
        };

        Ok(Self {
            llm_api_key: get("LLM_API_KEY"),
            model_name: get("MODEL_NAME").unwrap_or(defaults.model_name),
            model_base_url,
            context_window: parsed("CONTEXT_WINDOW_SIZE", get("CONTEXT_WINDOW_SIZE"))?
                .unwrap_or(defaults.context_window),
            host: get("API_HOST").unwrap_or(defaults.host),
            port: parsed("API_PORT", get("API_PORT"))?.unwrap_or(defaults.port),
            database_url: get("DATABASE_URL"),
            mcp_servers_file: get("MCP_SERVERS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.mcp_servers_file),
            mcp_default_url: get("MCP_SERVER_HOST"),
            credentials: McpCredentials {
                github_token: get("GITHUB_TOKEN"),
                auth_token: get("MCP_AUTH_TOKEN"),
            },
            mcp,
            auth_secret: get("AUTH_SECRET"),
            email: EmailConfig {
                address: get("EMAIL_ADDRESS"),
                password: get("EMAIL_PASSWORD"),
            },
        })
    }
}

fn parsed<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        })
    })
    .transpose()
}

/// `gsk_abcdefgh****wxyz`: enough to tell keys apart in logs.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => "<no-key>".to_string(),
        n if n > 12 => format!(
            "{}{}{}",
            chars[..8].iter().collect::<String>(),
            "*".repeat(n - 12),
            chars[n - 4..].iter().collect::<String>()
        ),
        n if n > 2 => format!("{}{}{}", chars[0], "*".repeat(n - 2), chars[n - 1]),
        n => "*".repeat(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let c = config(&[]).unwrap();
        assert_eq!(c.model_name, "llama-3.1-8b-instant");
        assert_eq!(c.context_window, 5);
        assert_eq!(c.port, 8000);
        assert_eq!(c.mcp.call_timeout, Duration::from_secs(30));
        assert_eq!(c.mcp.init_timeout, Duration::from_secs(15));
        assert_eq!(c.mcp.notify_timeout, Duration::from_secs(5));
        assert!(c.database_url.is_none());
        assert!(!c.email.is_configured());
    }

    #[test]
    fn overrides_and_empty_values() {
        let c = config(&[
            ("API_PORT", "9000"),
            ("MCP_CALL_TIMEOUT_SECS", "3"),
            ("GITHUB_TOKEN", "ghp_1"),
            ("AUTH_SECRET", "  "),
            ("MCP_SERVERS_FILE", "/etc/mcp.json"),
        ])
        .unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.mcp.call_timeout, Duration::from_secs(3));
        assert_eq!(c.credentials.github_token.as_deref(), Some("ghp_1"));
        assert!(c.auth_secret.is_none());
        assert_eq!(c.mcp_servers_file, PathBuf::from("/etc/mcp.json"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("API_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().starts_with("API_PORT has invalid value 'eighty'"));
        assert!(config(&[("MODEL_BASE_URL", "not a url")]).is_err());
    }

    #[test]
    fn email_needs_address_and_password() {
        assert!(!config(&[("EMAIL_ADDRESS", "me@example.com")]).unwrap().email.is_configured());
        let c = config(&[("EMAIL_ADDRESS", "me@example.com"), ("EMAIL_PASSWORD", "pw"), ("SMTP_PORT", "nope")]).unwrap();
        assert!(c.email.is_configured());
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key(""), "<no-key>");
        assert_eq!(mask_key("abcd"), "a**d");
        assert_eq!(mask_key("gsk_1234567890abcd"), "gsk_1234******abcd");
    }
}
