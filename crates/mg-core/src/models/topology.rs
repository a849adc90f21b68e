use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::server::StartOutcome;

/// The on-disk record of a gateway session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedTopology {
    pub pid: u32,
    pub started: DateTime<Utc>,
    pub servers: Vec<PersistedServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedServer {
    pub name: String,
    pub port: u16,
    pub status: String,
}

impl PersistedTopology {
    /// Snapshot the servers that reached "running", in start order.
    pub fn from_outcomes(pid: u32, started: DateTime<Utc>, outcomes: &[StartOutcome]) -> Self {
        let servers = outcomes
            .iter()
            .filter(|o| o.is_running())
            .map(|o| PersistedServer {
                name: o.name.clone(),
                port: o.port,
                status: "running".to_string(),
            })
            .collect();
        Self {
            pid,
            started,
            servers,
        }
    }
}
