use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::models::{GatewayConfig, GatewaySettings};

pub const CONFIG_FILENAME: &str = "config.json";
pub const CONFIG_ENV: &str = "MCP_GATEWAY_CONFIG";

/// Load and validate the gateway config. `.yaml`/`.yml` files are parsed as
/// YAML, everything else as JSON.
pub fn load(config_path: &Path) -> Result<GatewayConfig> {
    if !config_path.exists() {
        return Err(GatewayError::ConfigNotFound(config_path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(config_path)?;
    let is_yaml = matches!(
        config_path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let config: GatewayConfig = if is_yaml {
        serde_yaml::from_str(&contents).map_err(|e| GatewayError::InvalidConfig(e.to_string()))?
    } else {
        serde_json::from_str(&contents).map_err(|e| GatewayError::InvalidConfig(e.to_string()))?
    };
    validate(&config)?;
    Ok(config)
}

/// Reject configs the registry cannot represent. Shared ports are allowed;
/// the second server simply fails its own port check at start time.
pub fn validate(config: &GatewayConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for server in &config.servers {
        if server.name.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "server name must not be empty".into(),
            ));
        }
        if server.command.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(format!(
                "server '{}' has no command",
                server.name
            )));
        }
        if server.port == 0 {
            return Err(GatewayError::InvalidConfig(format!(
                "server '{}' has no port",
                server.name
            )));
        }
        if !seen.insert(server.name.as_str()) {
            return Err(GatewayError::InvalidConfig(format!(
                "duplicate server name '{}'",
                server.name
            )));
        }
    }
    Ok(())
}

/// Resolve the config path: explicit flag, then `MCP_GATEWAY_CONFIG`, then a
/// `config.json` found walking up from `start` (stopping at a git root).
pub fn locate(explicit: Option<&Path>, start: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }

    let mut dir = start;
    loop {
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.exists() {
            return candidate;
        }
        if dir.join(".git").exists() {
            break;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }

    start.join(CONFIG_FILENAME)
}

/// The state file lives next to the config file unless given as absolute.
pub fn state_file_path(config_path: &Path, settings: &GatewaySettings) -> PathBuf {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    base.join(&settings.state_file)
}
