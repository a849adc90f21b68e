pub mod capability;
pub mod config;
pub mod server;
pub mod topology;

pub use capability::{Capability, Enrichment};
pub use config::{
    BridgeSettings, ClientSettings, GatewayConfig, GatewaySettings, ServerSpec, WarmupSettings,
};
pub use server::{ProcessExit, ProcessRecord, ProcessStatus, StartOutcome, StartStatus};
pub use topology::{PersistedServer, PersistedTopology};
