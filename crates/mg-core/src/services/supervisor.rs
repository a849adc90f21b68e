use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::models::{
    BridgeSettings, ProcessExit, ProcessRecord, ProcessStatus, ServerSpec, StartOutcome,
    StartStatus,
};

use super::output::OutputLine;
use super::registry::Registry;
use super::{bridge, ports};

/// Starts one bridged process per server and tracks it in the registry.
pub struct Supervisor {
    registry: Registry,
    bridge: BridgeSettings,
    /// How long a fresh process gets to bind its port before it is judged.
    settle: Duration,
    output_tx: mpsc::UnboundedSender<OutputLine>,
}

impl Supervisor {
    pub fn new(
        registry: Registry,
        bridge: BridgeSettings,
        settle: Duration,
        output_tx: mpsc::UnboundedSender<OutputLine>,
    ) -> Self {
        Self {
            registry,
            bridge,
            settle,
            output_tx,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Start one server. Never fails: refusals and failures come back as a
    /// typed outcome and leave the other servers unaffected.
    pub async fn start(&self, spec: &ServerSpec) -> StartOutcome {
        if !spec.enabled {
            tracing::info!(server = %spec.name, "Skipping {} (disabled)", spec.name);
            return StartOutcome::new(spec, StartStatus::Disabled);
        }

        if ports::is_in_use(spec.port).await {
            let conflict = GatewayError::PortConflict {
                name: spec.name.clone(),
                port: spec.port,
            };
            tracing::warn!(server = %spec.name, port = spec.port, "{conflict}");
            return StartOutcome::new(spec, StartStatus::PortInUse).with_detail(conflict.to_string());
        }

        tracing::info!(server = %spec.name, port = spec.port, "Starting {} on port {}...", spec.name, spec.port);
        if !spec.description.is_empty() {
            tracing::info!(server = %spec.name, "  {}", spec.description);
        }

        let spec = Arc::new(spec.clone());
        let child = match bridge::spawn(&self.bridge, &spec, self.output_tx.clone()) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(server = %spec.name, "{e}");
                return StartOutcome::new(&spec, StartStatus::SpawnFailed).with_detail(e.to_string());
            }
        };

        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        self.registry
            .insert(ProcessRecord::new(spec.clone(), pid), kill_tx)
            .await;
        observe_exit(child, spec.name.clone(), pid, kill_rx, self.registry.clone());

        tokio::time::sleep(self.settle).await;

        if ports::is_in_use(spec.port).await {
            self.registry
                .set_status(&spec.name, ProcessStatus::Running)
                .await;
            tracing::info!(
                server = %spec.name,
                "{} started successfully on http://localhost:{}",
                spec.name,
                spec.port
            );
            StartOutcome::new(&spec, StartStatus::Running)
        } else {
            // Left alive: it may still be doing something useful, just not
            // listening. Shutdown will collect it.
            self.registry
                .set_status(&spec.name, ProcessStatus::Failed)
                .await;
            tracing::error!(server = %spec.name, "{} failed to start", spec.name);
            StartOutcome::new(&spec, StartStatus::Failed)
        }
    }

    /// Start servers strictly one after another so port checks never race.
    /// Once `cancel` fires no further server is started.
    pub async fn start_all<'a, I>(&self, specs: I, cancel: &CancellationToken) -> Vec<StartOutcome>
    where
        I: IntoIterator<Item = &'a ServerSpec>,
    {
        let mut outcomes = Vec::new();
        for spec in specs {
            if cancel.is_cancelled() {
                tracing::info!(server = %spec.name, "Not starting {} (shutting down)", spec.name);
                break;
            }
            outcomes.push(self.start(spec).await);
        }
        outcomes
    }
}

/// Own the child until it exits, then hand a typed exit event to the registry.
fn observe_exit(
    mut child: Child,
    name: String,
    pid: Option<u32>,
    mut kill_rx: oneshot::Receiver<()>,
    registry: Registry,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            Ok(()) = &mut kill_rx => {
                let _ = child.start_kill();
                child.wait().await
            }
        };

        let exit = match status {
            Ok(status) => ProcessExit {
                name,
                pid,
                code: status.code(),
                success: status.success(),
            },
            Err(e) => {
                tracing::warn!(server = %name, error = %e, "wait_failed");
                ProcessExit {
                    name,
                    pid,
                    code: None,
                    success: false,
                }
            }
        };
        registry.observe_exit(&exit).await;
    })
}
