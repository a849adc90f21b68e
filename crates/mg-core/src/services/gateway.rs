use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{GatewayError, Result};
use crate::models::{GatewayConfig, PersistedTopology, StartOutcome};

use super::output::{self, OutputLine};
use super::publisher::{self, PublisherState, RunningPublisher};
use super::readiness::{ReadinessProber, WarmupReport};
use super::registry::{CapabilityCache, Registry};
use super::state::TopologyStore;
use super::supervisor::Supervisor;
use super::{host, ports, process_control};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// What a completed startup produced, for the operator instructions.
#[derive(Debug, Clone)]
pub struct StartupSummary {
    pub outcomes: Vec<StartOutcome>,
    pub warmups: Vec<WarmupReport>,
    pub host: String,
    pub config_addr: SocketAddr,
}

impl StartupSummary {
    pub fn running(&self) -> impl Iterator<Item = &StartOutcome> {
        self.outcomes.iter().filter(|o| o.is_running())
    }
}

/// Owns one orchestration session: publisher, children, persisted state.
pub struct Gateway {
    config: GatewayConfig,
    store: TopologyStore,
    registry: Registry,
    capabilities: CapabilityCache,
    supervisor: Supervisor,
    prober: ReadinessProber,
    host: String,
    state: LifecycleState,
    publisher_bind: SocketAddr,
    publisher: Option<RunningPublisher>,
    shutdown: CancellationToken,
    output_rx: Option<mpsc::UnboundedReceiver<OutputLine>>,
    output_logger: Option<tokio::task::JoinHandle<()>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, store: TopologyStore) -> Result<Self> {
        let registry = Registry::new();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(
            registry.clone(),
            config.gateway.bridge.clone(),
            config.gateway.settle(),
            output_tx,
        );
        let prober = ReadinessProber::new(config.gateway.warmup.into())?;
        let host = host::detect(config.gateway.public_host.as_deref());
        let publisher_bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.gateway.config_port));

        Ok(Self {
            config,
            store,
            registry,
            capabilities: CapabilityCache::new(),
            supervisor,
            prober,
            host,
            state: LifecycleState::Idle,
            publisher_bind,
            publisher: None,
            shutdown: CancellationToken::new(),
            output_rx: Some(output_rx),
            output_logger: None,
        })
    }

    /// Serve the config document somewhere other than `0.0.0.0:<configPort>`.
    pub fn with_publisher_addr(mut self, addr: SocketAddr) -> Self {
        self.publisher_bind = addr;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn capabilities(&self) -> &CapabilityCache {
        &self.capabilities
    }

    pub fn publisher_addr(&self) -> Option<SocketAddr> {
        self.publisher.as_ref().map(RunningPublisher::local_addr)
    }

    /// Cancelling this token (from a signal handler or anywhere else)
    /// ends [`Gateway::run_until_shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Idle → Starting → Running: publisher, sequential starts, concurrent
    /// warmups, persisted topology. A cancelled shutdown token stops the
    /// sequence early; nothing is persisted and `run_until_shutdown` tears
    /// down whatever did start.
    pub async fn start(&mut self) -> Result<StartupSummary> {
        if self.state != LifecycleState::Idle {
            return Err(GatewayError::State(format!(
                "cannot start from {:?}",
                self.state
            )));
        }
        self.state = LifecycleState::Starting;
        let started = Utc::now();
        tracing::info!("MCP Gateway starting...");
        tracing::info!(host = %self.host, "Host IP: {}", self.host);

        if let Some(rx) = self.output_rx.take() {
            self.output_logger = Some(output::spawn_logger(rx));
        }

        let publisher_state = PublisherState::new(
            &self.config,
            &self.host,
            self.registry.clone(),
            self.capabilities.clone(),
        );
        let running = match publisher::start(
            self.publisher_bind,
            publisher_state,
            self.shutdown.child_token(),
        )
        .await
        {
            Ok(running) => running,
            Err(e) => {
                self.state = LifecycleState::Stopped;
                return Err(e);
            }
        };
        let config_addr = running.local_addr();
        self.publisher = Some(running);
        tracing::info!(
            "Config server: http://{}:{}/config.json",
            self.host,
            config_addr.port()
        );

        let outcomes = self
            .supervisor
            .start_all(&self.config.servers, &self.shutdown)
            .await;
        if self.shutdown.is_cancelled() {
            tracing::warn!("Startup interrupted, skipping warmup");
            self.state = LifecycleState::Running;
            return Ok(StartupSummary {
                outcomes,
                warmups: Vec::new(),
                host: self.host.clone(),
                config_addr,
            });
        }

        let targets: Vec<(String, u16)> = outcomes
            .iter()
            .filter(|o| o.is_running())
            .map(|o| (o.name.clone(), o.port))
            .collect();
        let warmups = if targets.is_empty() {
            Vec::new()
        } else {
            tracing::info!("Warming up servers...");
            tokio::select! {
                reports = self.prober.warmup_all(&targets, &self.capabilities) => reports,
                _ = self.shutdown.cancelled() => {
                    tracing::warn!("Startup interrupted during warmup");
                    Vec::new()
                }
            }
        };

        if !self.shutdown.is_cancelled() {
            let topology = PersistedTopology::from_outcomes(std::process::id(), started, &outcomes);
            if let Err(e) = self.store.save(&topology).await {
                tracing::error!(path = %self.store.path().display(), "{e}");
            }
        }

        self.state = LifecycleState::Running;
        Ok(StartupSummary {
            outcomes,
            warmups,
            host: self.host.clone(),
            config_addr,
        })
    }

    /// Block until the shutdown token fires, then shut down.
    pub async fn run_until_shutdown(&mut self) -> Result<()> {
        self.shutdown.cancelled().await;
        self.shutdown().await
    }

    /// Stop the publisher, terminate every child, remove the state file.
    /// Runs once; later calls are no-ops.
    pub async fn shutdown(&mut self) -> Result<()> {
        if matches!(
            self.state,
            LifecycleState::ShuttingDown | LifecycleState::Stopped
        ) {
            return Ok(());
        }
        self.state = LifecycleState::ShuttingDown;
        tracing::warn!("Shutting down MCP Gateway...");

        self.shutdown.cancel();
        if let Some(publisher) = self.publisher.take() {
            publisher.stop().await;
        }

        self.registry.terminate_all().await;
        if !self
            .registry
            .wait_until_empty(self.config.gateway.shutdown_grace())
            .await
        {
            self.registry.kill_remaining().await;
            self.registry.wait_until_empty(Duration::from_secs(2)).await;
        }

        if let Some(logger) = self.output_logger.take() {
            logger.abort();
        }

        let removed = self.store.remove().await;
        self.state = LifecycleState::Stopped;
        tracing::info!("MCP Gateway stopped");
        removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLiveness {
    pub name: String,
    pub port: u16,
    pub live: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    NotRunning,
    Active {
        pid: u32,
        started: DateTime<Utc>,
        servers: Vec<ServerLiveness>,
    },
}

/// Read the persisted topology and re-probe every recorded port. The file
/// only reflects the moment it was written, so liveness comes from the probe.
pub async fn status(store: &TopologyStore) -> Result<StatusReport> {
    let Some(topology) = store.load().await? else {
        return Ok(StatusReport::NotRunning);
    };
    let mut servers = Vec::with_capacity(topology.servers.len());
    for server in topology.servers {
        let live = ports::is_in_use(server.port).await;
        servers.push(ServerLiveness {
            name: server.name,
            port: server.port,
            live,
        });
    }
    Ok(StatusReport::Active {
        pid: topology.pid,
        started: topology.started,
        servers,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Signalled { pid: u32 },
    /// The recorded process was already gone; the record was cleaned up.
    ProcessGone { pid: u32 },
}

/// Signal a previously started (possibly detached) gateway and clear its record.
pub async fn stop(store: &TopologyStore) -> Result<StopOutcome> {
    let Some(topology) = store.load().await? else {
        return Ok(StopOutcome::NotRunning);
    };
    let pid = topology.pid;
    let outcome = if !process_control::is_signallable(pid) {
        tracing::warn!(pid, "state file holds an invalid pid, not signalling");
        StopOutcome::ProcessGone { pid }
    } else if !process_control::is_pid_alive(pid) {
        StopOutcome::ProcessGone { pid }
    } else {
        match process_control::terminate(pid) {
            Ok(()) => StopOutcome::Signalled { pid },
            Err(e) => {
                tracing::debug!(pid, error = %e, "stop_signal_failed");
                StopOutcome::ProcessGone { pid }
            }
        }
    };
    store.remove().await?;
    Ok(outcome)
}
