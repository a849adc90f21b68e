use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::json;

use crate::error::{GatewayError, Result};
use crate::models::{Capability, Enrichment, WarmupSettings};

use super::registry::CapabilityCache;

#[derive(Debug, Clone, Copy)]
pub struct WarmupPolicy {
    pub attempts: u32,
    pub delay: Duration,
    /// Bound on a single connection attempt; a hang aborts that attempt only.
    pub attempt_timeout: Duration,
}

impl From<WarmupSettings> for WarmupPolicy {
    fn from(settings: WarmupSettings) -> Self {
        Self {
            attempts: settings.attempts.max(1),
            delay: Duration::from_millis(settings.delay_ms),
            attempt_timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

impl Default for WarmupPolicy {
    fn default() -> Self {
        WarmupSettings::default().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupReport {
    pub name: String,
    pub port: u16,
    pub ready: bool,
    pub attempts: u32,
    pub enrichment: Enrichment,
}

#[derive(Deserialize)]
struct ToolsListResponse {
    result: Option<ToolsListResult>,
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Option<Vec<Capability>>,
}

/// Confirms a freshly started server answers on its SSE endpoint and primes
/// the capability cache from `tools/list`.
#[derive(Clone)]
pub struct ReadinessProber {
    http: reqwest::Client,
    policy: WarmupPolicy,
    host: String,
}

impl ReadinessProber {
    pub fn new(policy: WarmupPolicy) -> Result<Self> {
        // No client-wide timeout: the SSE response never completes.
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            policy,
            host: "127.0.0.1".to_string(),
        })
    }

    pub fn policy(&self) -> WarmupPolicy {
        self.policy
    }

    fn url(&self, port: u16, path: &str) -> String {
        format!("http://{}:{port}{path}", self.host)
    }

    /// Retry the SSE probe until it succeeds or the attempt budget runs out.
    pub async fn warmup(&self, name: &str, port: u16, cache: &CapabilityCache) -> WarmupReport {
        let mut report = WarmupReport {
            name: name.to_string(),
            port,
            ready: false,
            attempts: 0,
            enrichment: Enrichment::NotAttempted,
        };

        for attempt in 1..=self.policy.attempts {
            report.attempts = attempt;
            match self.probe_sse(port).await {
                Ok(()) => {
                    tracing::info!(server = %name, attempt, "  {name}: warmed up (attempt {attempt})");
                    report.ready = true;
                    report.enrichment = self.discover(name, port, cache).await;
                    return report;
                }
                Err(e) => {
                    tracing::debug!(server = %name, attempt, error = %e, "warmup_attempt_failed");
                }
            }
            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        let timeout = GatewayError::ReadinessTimeout {
            name: name.to_string(),
            attempts: self.policy.attempts,
        };
        tracing::warn!(server = %name, "  {timeout}");
        report
    }

    /// Warm up every target concurrently; each target retries on its own.
    pub async fn warmup_all(
        &self,
        targets: &[(String, u16)],
        cache: &CapabilityCache,
    ) -> Vec<WarmupReport> {
        let mut tasks = tokio::task::JoinSet::new();
        for (name, port) in targets {
            let prober = self.clone();
            let cache = cache.clone();
            let name = name.clone();
            let port = *port;
            tasks.spawn(async move { prober.warmup(&name, port, &cache).await });
        }

        let mut reports = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(error = %e, "warmup_task_failed"),
            }
        }
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }

    async fn probe_sse(&self, port: u16) -> Result<()> {
        let request = self
            .http
            .get(self.url(port, "/sse"))
            .header(ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(self.policy.attempt_timeout, request)
            .await
            .map_err(|_| GatewayError::Io(std::io::ErrorKind::TimedOut.into()))??;
        // Dropping the response closes the stream without reading it.
        response.error_for_status()?;
        Ok(())
    }

    /// Best-effort `tools/list`. Failure never affects readiness.
    async fn discover(&self, name: &str, port: u16, cache: &CapabilityCache) -> Enrichment {
        match self.fetch_tools(port).await {
            Ok(tools) => {
                let count = tools.len();
                cache.store(name, tools).await;
                tracing::debug!(server = %name, "  {name}: cached {count} tools");
                Enrichment::Populated(count)
            }
            Err(reason) => {
                tracing::trace!(server = %name, %reason, "tools_list_unavailable");
                Enrichment::Failed(reason)
            }
        }
    }

    async fn fetch_tools(&self, port: u16) -> std::result::Result<Vec<Capability>, String> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/list",
            "params": {}
        });
        let request = self.http.post(self.url(port, "/message")).json(&body).send();
        let response = tokio::time::timeout(self.policy.attempt_timeout, request)
            .await
            .map_err(|_| "timed out".to_string())?
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let parsed: ToolsListResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .result
            .and_then(|r| r.tools)
            .ok_or_else(|| "response carried no tool list".to_string())
    }
}
