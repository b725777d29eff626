//! HTTP client configuration.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::envelope::SUCCESS_CODE;

/// Environment variable prefix used by [`HttpClientConfig::from_env`].
pub const DEFAULT_ENV_PREFIX: &str = "COURIER";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Canned messages keyed by HTTP status, used when an error response does not
/// carry its own message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessages {
    messages: BTreeMap<u16, String>,
}

impl StatusMessages {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            messages: BTreeMap::new(),
        }
    }

    /// Add or replace the message for a status.
    pub fn with(mut self, status: u16, message: impl Into<String>) -> Self {
        self.insert(status, message);
        self
    }

    /// Add or replace the message for a status.
    pub fn insert(&mut self, status: u16, message: impl Into<String>) {
        self.messages.insert(status, message.into());
    }

    /// Look up the message for a status.
    pub fn get(&self, status: u16) -> Option<&str> {
        self.messages.get(&status).map(String::as_str)
    }

    /// Resolve a message, falling back to a generic one.
    pub fn resolve(&self, status: u16) -> String {
        self.get(status)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {status}"))
    }
}

impl Default for StatusMessages {
    fn default() -> Self {
        Self::empty()
            .with(400, "Bad Request - 请求参数错误")
            .with(401, "Unauthorized - 未授权访问")
            .with(403, "Forbidden - 禁止访问")
            .with(404, "Not Found - 资源不存在")
            .with(422, "Unprocessable Entity - 请求参数验证失败")
            .with(429, "Too Many Requests - 请求过于频繁")
            .with(500, "Internal Server Error - 服务器内部错误")
            .with(502, "Bad Gateway - 网关错误")
            .with(503, "Service Unavailable - 服务不可用")
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL that relative request URLs are joined onto.
    pub base_url: Option<String>,
    /// Default request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Default headers for all requests. Caller headers win on conflict.
    pub default_headers: Vec<(String, String)>,
    /// Envelope code that marks logical success.
    pub success_code: i64,
    /// Messages for error statuses without a payload message.
    pub status_messages: StatusMessages,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            default_headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            success_code: SUCCESS_CODE,
            status_messages: StatusMessages::default(),
            user_agent: format!("courier-http/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Load configuration from `COURIER_*` environment variables and `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load configuration from `<PREFIX>_*` environment variables.
    ///
    /// Recognised keys: `BASE_URL`, `TIMEOUT_MS`, `CONNECT_TIMEOUT_MS`,
    /// `SUCCESS_CODE` and `USER_AGENT`. Unset keys keep their defaults.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let var = |key: &str| env::var(format!("{prefix}_{key}")).ok();
        let mut config = Self::default();

        if let Some(url) = var("BASE_URL") {
            config.base_url = Some(url);
        }
        if let Some(ms) = var("TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_value(prefix, "TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = var("CONNECT_TIMEOUT_MS") {
            config.connect_timeout =
                Duration::from_millis(parse_value(prefix, "CONNECT_TIMEOUT_MS", &ms)?);
        }
        if let Some(code) = var("SUCCESS_CODE") {
            config.success_code = parse_value(prefix, "SUCCESS_CODE", &code)?;
        }
        if let Some(agent) = var("USER_AGENT") {
            config.user_agent = agent;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("Failed to read file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML.
    ///
    /// ```toml
    /// base_url = "https://api.example.com"
    /// timeout_ms = 15000
    /// success_code = 10000
    ///
    /// [headers]
    /// X-Client = "web"
    ///
    /// [status_messages]
    /// 404 = "Nothing here"
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;
        file.into_config()
    }
}

fn parse_value<T: std::str::FromStr>(prefix: &str, key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: format!("{prefix}_{key}"),
        value: raw.to_string(),
    })
}

/// On-disk configuration layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    success_code: Option<i64>,
    user_agent: Option<String>,
    follow_redirects: Option<bool>,
    headers: HashMap<String, String>,
    status_messages: HashMap<String, String>,
}

impl FileConfig {
    fn into_config(self) -> Result<HttpClientConfig, ConfigError> {
        let mut builder = HttpClientConfig::builder();

        if let Some(url) = self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(ms) = self.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(code) = self.success_code {
            builder = builder.success_code(code);
        }
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        if let Some(follow) = self.follow_redirects {
            builder = builder.follow_redirects(follow);
        }
        for (name, value) in self.headers {
            builder = builder.default_header(name, value);
        }
        for (status, message) in self.status_messages {
            let code = status.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "status_messages".to_string(),
                value: status.clone(),
            })?;
            builder = builder.status_message(code, message);
        }

        Ok(builder.build())
    }
}

/// Builder for HTTP client configuration.
#[derive(Debug, Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL for all requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the connection pool idle timeout.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Add a default header for all requests, replacing any default of the same name.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.config
            .default_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.config.default_headers.push((name, value.into()));
        self
    }

    /// Drop all default headers, including `Content-Type`.
    pub fn clear_default_headers(mut self) -> Self {
        self.config.default_headers.clear();
        self
    }

    /// Set the envelope code that marks logical success.
    pub fn success_code(mut self, code: i64) -> Self {
        self.config.success_code = code;
        self
    }

    /// Override the message for one status.
    pub fn status_message(mut self, status: u16, message: impl Into<String>) -> Self {
        self.config.status_messages.insert(status, message);
        self
    }

    /// Replace the whole status message table.
    pub fn status_messages(mut self, messages: StatusMessages) -> Self {
        self.config.status_messages = messages;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}
