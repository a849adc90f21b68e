use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("port {port} already in use for '{name}'")]
    PortConflict { name: String, port: u16 },

    #[error("failed to spawn '{name}': {reason}")]
    Spawn { name: String, reason: String },

    #[error("'{name}' did not become reachable after {attempts} attempts")]
    ReadinessTimeout { name: String, attempts: u32 },

    #[error("config server could not bind port {port}: {source}")]
    PublisherBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("state persistence failed: {0}")]
    State(String),

    #[error("signal delivery failed: {0}")]
    Signal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
