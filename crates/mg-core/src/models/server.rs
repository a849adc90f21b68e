use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::ServerSpec;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProcessStatus {
    Starting,
    Running,
    Failed,
    Exited,
}

/// Result of one `start` attempt. Every path, including refusals, lands here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StartStatus {
    Running,
    /// Spawned, but the port was still free after the settle interval.
    Failed,
    Disabled,
    PortInUse,
    SpawnFailed,
}

impl StartStatus {
    /// Whether a process was created for this attempt.
    pub fn spawned(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub name: String,
    pub port: u16,
    pub status: StartStatus,
    pub detail: Option<String>,
}

impl StartOutcome {
    pub fn new(spec: &ServerSpec, status: StartStatus) -> Self {
        Self {
            name: spec.name.clone(),
            port: spec.port,
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == StartStatus::Running
    }
}

/// A live child process tracked by the supervisor.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: Option<u32>,
    pub port: u16,
    pub spec: Arc<ServerSpec>,
    pub status: ProcessStatus,
    pub started_at: DateTime<Utc>,
}

impl ProcessRecord {
    pub fn new(spec: Arc<ServerSpec>, pid: Option<u32>) -> Self {
        Self {
            pid,
            port: spec.port,
            spec,
            status: ProcessStatus::Starting,
            started_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Typed "process terminated" event delivered by a child's exit observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub name: String,
    pub pid: Option<u32>,
    /// `None` when the process was ended by a signal.
    pub code: Option<i32>,
    pub success: bool,
}
