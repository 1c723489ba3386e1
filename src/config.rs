//! Configuration management for assistant-bridge.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values
//!
//! The loaded [`Config`] is built once at startup and handed to the
//! components that need it.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::assistant::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::cli::Args;
use crate::conversation::{
    DriverSettings, PollPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT,
    RUN_FAILED_REPLY,
};
use crate::session::DEFAULT_STORE_PATH;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Assistant service credentials and identity.
    pub assistant: AssistantSection,
    /// Session store configuration.
    pub store: StoreSection,
    /// Run polling configuration.
    pub polling: PollingSection,
    /// User-facing reply configuration.
    pub reply: ReplySection,
    /// Server configuration.
    pub server: ServerSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Assistant service section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSection {
    /// API key for the assistant service.
    pub api_key: Option<String>,
    /// Assistant every run is started with.
    pub assistant_id: Option<String>,
    /// API root.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            api_key: None,
            assistant_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Session store section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Path of the identity→thread JSON file.
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

/// Run polling section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    /// Delay between status checks in milliseconds.
    pub interval_ms: u64,
    /// Maximum status checks per run.
    pub max_attempts: u32,
    /// Maximum seconds spent waiting for one run.
    pub timeout_secs: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
        }
    }
}

/// Reply section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplySection {
    /// Reply sent when a run fails or is cancelled.
    pub failure_message: String,
}

impl Default for ReplySection {
    fn default() -> Self {
        Self {
            failure_message: RUN_FAILED_REPLY.to_string(),
        }
    }
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Validated settings for talking to the assistant service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSettings {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment variable overrides from a lookup function.
    pub fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.assistant.api_key = Some(key);
        }

        if let Some(id) = non_empty("OPENAI_ASSISTANT_ID") {
            self.assistant.assistant_id = Some(id);
        }

        if let Some(url) = non_empty("ASSISTANT_BRIDGE_BASE_URL") {
            self.assistant.base_url = url;
        }

        if let Some(path) = non_empty("ASSISTANT_BRIDGE_STORE") {
            self.store.path = PathBuf::from(path);
        }

        if let Some(host) = non_empty("ASSISTANT_BRIDGE_HOST") {
            self.server.host = host;
        }

        if let Some(port) = non_empty("ASSISTANT_BRIDGE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(level) = non_empty("ASSISTANT_BRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = non_empty("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref path) = args.store {
            self.store.path = path.clone();
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env();

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        Ok(config)
    }

    /// Validate and extract the assistant service settings.
    pub fn assistant_settings(&self) -> Result<AssistantSettings, ConfigError> {
        let api_key = self
            .assistant
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let assistant_id = self
            .assistant
            .assistant_id
            .clone()
            .ok_or(ConfigError::Missing("OPENAI_ASSISTANT_ID"))?;

        Ok(AssistantSettings {
            api_key,
            assistant_id,
            base_url: self.assistant.base_url.clone(),
            request_timeout: Duration::from_secs(self.assistant.request_timeout_secs),
        })
    }

    /// Poll policy described by the polling section.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::default()
            .interval(Duration::from_millis(self.polling.interval_ms))
            .max_attempts(self.polling.max_attempts)
            .timeout(Duration::from_secs(self.polling.timeout_secs))
    }

    /// Driver settings for the given assistant.
    pub fn driver_settings(&self, assistant_id: impl Into<String>) -> DriverSettings {
        DriverSettings::new(assistant_id)
            .with_poll(self.poll_policy())
            .with_failure_reply(self.reply.failure_message.clone())
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        let mut server_config = ServerConfig::new(host.to_string(), self.server.port);
        if !self.server.graceful_shutdown {
            server_config = server_config.without_graceful_shutdown();
        }

        Ok(server_config)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Required setting absent from file and environment.
    Missing(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::Missing(name) => write!(f, "missing required setting: {}", name),
        }
    }
}

impl std::error::Error for ConfigError {}
