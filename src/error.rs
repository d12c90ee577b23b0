use thiserror::Error;

/// Unified error type for the workspace proxy library.
///
/// The policy core itself never fails; these errors come from the
/// configuration layer, the decision log and the host proxy.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Environment variable not set: {0}")]
    ConfigEnvVar(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;
