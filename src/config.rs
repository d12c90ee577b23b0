//! TOML configuration types for the workspace proxy.
//!
//! The top-level [`AppConfig`] is deserialized from `workspace-proxy.toml`. The
//! traffic policy itself is fixed; configuration only covers the host proxy
//! and its logging.
//!
//! # Example `workspace-proxy.toml`
//!
//! ```toml
//! [proxy]
//! listen = "127.0.0.1:8080"
//! upstream_timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! database = "${HOME}/.workspace-proxy/decisions.db"
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

static ENV_BRACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex")
});

// Uppercase only, to avoid rewriting `$` that appears in ordinary values.
static ENV_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z_][A-Z0-9_]*)").expect("valid env var regex"));

fn default_upstream_timeout_secs() -> u64 {
    30
}

fn default_max_header_bytes() -> usize {
    64 * 1024
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_level() -> String {
    "info".to_string()
}

/// Proxy server configuration (`[proxy]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Address to listen on (e.g., `"127.0.0.1:8080"`).
    pub listen: String,
    /// Timeout for a complete upstream exchange, in seconds.
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Upper bound on the size of a client request head.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Upper bound on a client request body. Larger bodies get `413`.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Pass CONNECT tunnels through. Off by default: tunnel contents never
    /// reach the gate, so websocket traffic inside one is not terminated.
    #[serde(default)]
    pub allow_connect: bool,
}

impl ProxyConfig {
    pub fn new(listen: &str) -> Self {
        Self {
            listen: listen.to_string(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            max_header_bytes: default_max_header_bytes(),
            max_body_bytes: default_max_body_bytes(),
            allow_connect: false,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Logging configuration (`[logging]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    /// Path of the SQLite decision log. Decisions are not persisted when unset.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            database: None,
        }
    }
}

/// Top-level application configuration deserialized from `workspace-proxy.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl AppConfig {
    /// Load and parse the configuration from a TOML file at the given path.
    ///
    /// `${VAR}` and `$VAR` placeholders are replaced with environment variable
    /// values before parsing. An unset variable is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

/// Replace `${VAR_NAME}` and `$VAR_NAME` placeholders with environment variable values.
fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();

    for cap in ENV_BRACES.captures_iter(input) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| GateError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    let intermediate = result.clone();
    for cap in ENV_BARE.captures_iter(&intermediate) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| GateError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}
