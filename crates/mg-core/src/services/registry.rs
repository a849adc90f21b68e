use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch, RwLock};

use crate::models::{Capability, ProcessExit, ProcessRecord, ProcessStatus};

use super::process_control;

struct Tracked {
    record: ProcessRecord,
    /// Tells the exit observer to force-kill the child.
    kill: Option<oneshot::Sender<()>>,
}

/// Live processes keyed by server name.
#[derive(Clone)]
pub struct Registry {
    tracked: Arc<RwLock<HashMap<String, Tracked>>>,
    active: Arc<watch::Sender<usize>>,
}

impl Registry {
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            tracked: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(active),
        }
    }

    pub async fn insert(&self, record: ProcessRecord, kill: oneshot::Sender<()>) {
        let mut tracked = self.tracked.write().await;
        tracked.insert(
            record.name().to_string(),
            Tracked {
                record,
                kill: Some(kill),
            },
        );
        self.active.send_replace(tracked.len());
    }

    pub async fn set_status(&self, name: &str, status: ProcessStatus) {
        let mut tracked = self.tracked.write().await;
        if let Some(entry) = tracked.get_mut(name) {
            entry.record.status = status;
        }
    }

    /// Consume a termination event: remove the matching record in one step.
    /// Events for a pid that is no longer tracked under that name are ignored.
    pub async fn observe_exit(&self, exit: &ProcessExit) -> Option<ProcessRecord> {
        let removed = {
            let mut tracked = self.tracked.write().await;
            let matches = tracked
                .get(&exit.name)
                .is_some_and(|entry| entry.record.pid == exit.pid);
            let removed = if matches {
                tracked.remove(&exit.name)
            } else {
                None
            };
            self.active.send_replace(tracked.len());
            removed
        };

        let code = exit
            .code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        if exit.success {
            tracing::info!(server = %exit.name, "{} exited with code {code}", exit.name);
        } else {
            tracing::error!(server = %exit.name, "{} exited with code {code}", exit.name);
        }

        removed.map(|mut entry| {
            entry.record.status = ProcessStatus::Exited;
            entry.record
        })
    }

    pub async fn get(&self, name: &str) -> Option<ProcessRecord> {
        let tracked = self.tracked.read().await;
        tracked.get(name).map(|e| e.record.clone())
    }

    /// Records sorted by name.
    pub async fn snapshot(&self) -> Vec<ProcessRecord> {
        let tracked = self.tracked.read().await;
        let mut records: Vec<_> = tracked.values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| a.name().cmp(b.name()));
        records
    }

    pub async fn len(&self) -> usize {
        self.tracked.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Send a termination request to every tracked process. A process that
    /// is already gone is not an error. Returns how many were signalled.
    pub async fn terminate_all(&self) -> usize {
        let tracked = self.tracked.read().await;
        let mut signalled = 0;
        for (name, entry) in tracked.iter() {
            let Some(pid) = entry.record.pid else {
                tracing::debug!(server = %name, "no_pid_to_signal");
                continue;
            };
            match process_control::terminate(pid) {
                Ok(()) => {
                    tracing::info!(server = %name, pid, "Stopping {name}...");
                    signalled += 1;
                }
                Err(e) => tracing::debug!(server = %name, error = %e, "terminate_failed"),
            }
        }
        signalled
    }

    /// Force-kill whatever is still tracked.
    pub async fn kill_remaining(&self) {
        let mut tracked = self.tracked.write().await;
        for (name, entry) in tracked.iter_mut() {
            if let Some(kill) = entry.kill.take() {
                tracing::warn!(server = %name, "force-killing {name}");
                let _ = kill.send(());
            }
        }
    }

    /// Wait until every tracked process has exited. Returns false on timeout.
    pub async fn wait_until_empty(&self, timeout: Duration) -> bool {
        let mut rx = self.active.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|count| *count == 0))
            .await
            .is_ok_and(|r| r.is_ok())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool lists discovered during warmup, keyed by server name. Concurrent
/// warmups each write only their own key.
#[derive(Clone, Default)]
pub struct CapabilityCache {
    entries: Arc<RwLock<HashMap<String, Vec<Capability>>>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, name: &str, capabilities: Vec<Capability>) {
        let mut entries = self.entries.write().await;
        entries.insert(name.to_string(), capabilities);
    }

    pub async fn get(&self, name: &str) -> Option<Vec<Capability>> {
        self.entries.read().await.get(name).cloned()
    }

    pub async fn count(&self, name: &str) -> Option<usize> {
        self.entries.read().await.get(name).map(Vec::len)
    }
}
