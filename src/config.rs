use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
const DEFAULT_CHAT_MODEL: &str = "deepseek-chat";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Bound on waiting for upstream response headers. `0` waits forever.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model id advertised next to the chat model for OpenAI-only clients.
    #[serde(default = "default_alias")]
    pub alias: String,
    #[serde(default = "default_owned_by")]
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Everything the relay needs to reach the upstream, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub completions_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub response_timeout: Option<Duration>,
}

fn default_port() -> u16 {
    9000
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_response_timeout() -> u64 {
    300
}

fn default_alias() -> String {
    "gpt-4o".to_string()
}

fn default_owned_by() -> String {
    "deepseek".to_string()
}

fn default_channel_capacity() -> usize {
    1
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamConfig::default(),
            models: ModelsConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_connect_timeout(),
            response_timeout_secs: default_response_timeout(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            owned_by: default_owned_by(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ProxyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Read the upstream credential from the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        match std::env::var(&self.upstream.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ProxyError::config(format!(
                "{} environment variable is required",
                self.upstream.api_key_env
            ))),
        }
    }

    /// Build the immutable upstream settings shared by every request.
    pub fn resolve_upstream(&self) -> Result<Upstream> {
        let api_key = self.resolve_api_key()?;
        self.upstream_with_key(api_key)
    }

    /// Like [`resolve_upstream`](Self::resolve_upstream) with an explicit credential.
    pub fn upstream_with_key(&self, api_key: impl Into<String>) -> Result<Upstream> {
        let base_url = self.upstream.base_url.trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ProxyError::config(format!(
                "upstream.base_url must be an http(s) URL, got '{}'",
                self.upstream.base_url
            )));
        }

        let response_timeout = match self.upstream.response_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Upstream {
            completions_url: format!("{}/chat/completions", base_url),
            api_key: api_key.into(),
            chat_model: self.upstream.chat_model.clone(),
            response_timeout,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.connect_timeout_secs)
    }

    pub fn channel_capacity(&self) -> usize {
        self.relay.channel_capacity.max(1)
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("deepseek-proxy.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("deepseek-proxy").join("config.toml"));
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("deepseek-proxy").join("config.toml"));
        paths.push(home.join(".deepseek-proxy.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[upstream]
base_url = "http://localhost:8080/v1/"
api_key_env = "TEST_DEEPSEEK_KEY"
response_timeout_secs = 0

[models]
alias = "gpt-4o-mini"

[relay]
channel_capacity = 4
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upstream.api_key_env, "TEST_DEEPSEEK_KEY");
        assert_eq!(config.upstream.chat_model, "deepseek-chat");
        assert_eq!(config.models.alias, "gpt-4o-mini");
        assert_eq!(config.models.owned_by, "deepseek");
        assert_eq!(config.channel_capacity(), 4);

        let upstream = config.upstream_with_key("sk-test").unwrap();
        assert_eq!(
            upstream.completions_url,
            "http://localhost:8080/v1/chat/completions"
        );
        assert!(upstream.response_timeout.is_none());
    }

    #[test]
    fn test_defaults_target_deepseek() {
        let config = ProxyConfig::default();
        assert_eq!(config.port, 9000);

        let upstream = config.upstream_with_key("sk-test").unwrap();
        assert_eq!(
            upstream.completions_url,
            "https://api.deepseek.com/v1/chat/completions"
        );
        assert_eq!(upstream.chat_model, "deepseek-chat");
        assert_eq!(upstream.response_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.channel_capacity(), 1);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let mut config = ProxyConfig::default();
        config.upstream.api_key_env = "DEEPSEEK_PROXY_TEST_UNSET_KEY".to_string();

        let err = config.resolve_upstream().unwrap_err();
        assert!(matches!(err, ProxyError::Config { .. }));
        assert!(err.to_string().contains("DEEPSEEK_PROXY_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = "api.deepseek.com".to_string();
        assert!(config.upstream_with_key("sk-test").is_err());
    }

    #[test]
    fn test_zero_channel_capacity_is_clamped() {
        let mut config = ProxyConfig::default();
        config.relay.channel_capacity = 0;
        assert_eq!(config.channel_capacity(), 1);
    }
}
