//! Configuration module
//!
//! Values come from a YAML file, then environment variables, then CLI flags
//! (applied by `main`). [`Config::validate`] runs last.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the bearer secret
pub const ENV_AUTH_TOKEN: &str = "AUTH_TOKEN";
/// Environment variable holding the identifier returned by `validate`
pub const ENV_VALIDATE_ID: &str = "MY_NUMBER";
/// Environment variable holding the discovery provider API key
pub const ENV_DISCOVERY_API_KEY: &str = "DISCOVERY_API_KEY";
/// Environment variable overriding the listen address
pub const ENV_LISTEN_ADDR: &str = "LISTEN_ADDR";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tool endpoint listen address
    pub listen: String,

    /// Bearer secret every caller must present
    #[serde(rename = "auth-token")]
    pub auth_token: Option<String>,

    /// Identifier returned by the `validate` tool
    #[serde(rename = "validate-id")]
    pub validate_id: Option<String>,

    /// Log level
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Status probe settings
    pub probe: ProbeConfig,

    /// DNS settings for SRV lookups
    pub dns: DnsConfig,

    /// Alternative-discovery settings
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Load configuration from file and apply environment overrides.
    ///
    /// A missing file is not an error: defaults plus environment may suffice.
    /// Not validated yet; CLI flags may still fill gaps.
    pub fn read(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values found through `lookup` (normally the process environment)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token);
        }
        if let Some(id) = lookup(ENV_VALIDATE_ID) {
            self.validate_id = Some(id);
        }
        if let Some(key) = lookup(ENV_DISCOVERY_API_KEY) {
            self.discovery.completion.api_key = Some(key);
        }
        if let Some(listen) = lookup(ENV_LISTEN_ADDR) {
            self.listen = listen;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(Error::config(format!(
                "auth-token is required (set it in the config file or {})",
                ENV_AUTH_TOKEN
            )));
        }
        if self.validate_id.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(Error::config(format!(
                "validate-id is required (set it in the config file or {})",
                ENV_VALIDATE_ID
            )));
        }

        self.listen_addr()?;
        self.probe.validate()?;
        self.discovery.validate()?;
        Ok(())
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| Error::config(format!("invalid listen address '{}': {}", self.listen, e)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: "0.0.0.0:8086".to_string(),
            auth_token: None,
            validate_id: None,
            log_level: Some("info".to_string()),
            probe: ProbeConfig::default(),
            dns: DnsConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Status probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// TCP connect timeout
    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// Timeout for each protocol read
    #[serde(rename = "read-timeout-ms")]
    pub read_timeout_ms: u64,

    /// Overall deadline for one invocation (probe plus discovery)
    #[serde(rename = "request-deadline-ms")]
    pub request_deadline_ms: u64,

    /// Resolve `_minecraft._tcp` SRV records when no port is given
    #[serde(rename = "srv-lookup")]
    pub srv_lookup: bool,
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(Error::config("probe timeouts must be greater than zero"));
        }
        if self.request_deadline_ms == 0 {
            return Err(Error::config("probe.request-deadline-ms must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
            request_deadline_ms: 45000,
            srv_lookup: true,
        }
    }
}

/// DNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Nameservers (`ip` or `ip:port`); empty means the system configuration
    pub nameserver: Vec<String>,

    /// Per-query timeout
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig {
            nameserver: Vec::new(),
            timeout_ms: 3000,
        }
    }
}

/// Which discovery provider is used (static, never per request)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    #[default]
    Search,
    Completion,
}

impl fmt::Display for DiscoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryKind::Search => write!(f, "search"),
            DiscoveryKind::Completion => write!(f, "completion"),
        }
    }
}

/// Alternative-discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Provider variant
    pub kind: DiscoveryKind,

    /// Number of suggestions to collect or request
    #[serde(rename = "max-results")]
    pub max_results: usize,

    /// Bound on each HTTP request
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Search variant settings
    pub search: SearchConfig,

    /// Completion variant settings
    pub completion: CompletionConfig,
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(Error::config("discovery.max-results must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("discovery.timeout-ms must be greater than zero"));
        }

        let endpoint = match self.kind {
            DiscoveryKind::Search => &self.search.endpoint,
            DiscoveryKind::Completion => &self.completion.endpoint,
        };
        url::Url::parse(endpoint).map_err(|e| {
            Error::config(format!("invalid {} endpoint '{}': {}", self.kind, endpoint, e))
        })?;

        if self.kind == DiscoveryKind::Completion
            && self.completion.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(Error::config(format!(
                "discovery.completion.api-key is required for the completion provider (or {})",
                ENV_DISCOVERY_API_KEY
            )));
        }
        Ok(())
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            kind: DiscoveryKind::Search,
            max_results: 5,
            timeout_ms: 30000,
            search: SearchConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

/// Search variant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// HTML search endpoint; the query goes into the `q` parameter
    pub endpoint: String,

    /// Fixed search phrase
    pub query: String,

    /// User-Agent header sent with the search request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            endpoint: "https://html.duckduckgo.com/html/".to_string(),
            query: "public Minecraft servers list".to_string(),
            user_agent: "MinecraftServerFinder/1.0".to_string(),
        }
    }
}

/// Completion variant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Chat-completion endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Bearer key for the endpoint
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            api_key: None,
        }
    }
}
