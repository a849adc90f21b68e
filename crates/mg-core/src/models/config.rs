use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_CONFIG_PORT: u16 = 8930;
pub const DEFAULT_STATE_FILE: &str = ".gateway.pid";

#[cfg(windows)]
const NPX: &str = "npx.cmd";
#[cfg(not(windows))]
const NPX: &str = "npx";

/// Top-level gateway configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    pub servers: Vec<ServerSpec>,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl GatewayConfig {
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerSpec> {
        self.servers.iter().filter(|s| s.enabled)
    }
}

/// One stdio MCP server to run behind the bridging tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

impl ServerSpec {
    /// The stdio command line the bridging tool proxies, as one string.
    pub fn stdio_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    pub config_port: u16,
    /// Address advertised when the connection does not reveal one.
    pub public_host: Option<String>,
    pub state_file: String,
    pub settle_ms: u64,
    pub shutdown_grace_ms: u64,
    pub bridge: BridgeSettings,
    pub client: ClientSettings,
    pub warmup: WarmupSettings,
}

impl GatewaySettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            config_port: DEFAULT_CONFIG_PORT,
            public_host: None,
            state_file: DEFAULT_STATE_FILE.to_string(),
            settle_ms: 2000,
            shutdown_grace_ms: 5000,
            bridge: BridgeSettings::default(),
            client: ClientSettings::default(),
            warmup: WarmupSettings::default(),
        }
    }
}

/// The program that exposes a stdio server over HTTP/SSE.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            command: NPX.to_string(),
            args: vec!["-y".into(), "supergateway".into()],
        }
    }
}

/// The program a remote client runs to dial a published server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    pub command: String,
    pub args: Vec<String>,
    pub trailing_args: Vec<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        // Always `npx`: the document is consumed on the client side.
        Self {
            command: "npx".into(),
            args: vec!["-y".into(), "mcp-remote".into()],
            trailing_args: vec!["--allow-http".into()],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarmupSettings {
    pub attempts: u32,
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay_ms: 500,
            timeout_ms: 3000,
        }
    }
}

fn default_true() -> bool {
    true
}
