#![cfg(unix)]

mod common;

use std::net::{Ipv4Addr, SocketAddr};
use std::os::unix::process::ExitStatusExt;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use mg_core::models::{
    BridgeSettings, PersistedServer, PersistedTopology, ProcessStatus, StartStatus,
};
use mg_core::services::gateway::{self, Gateway, LifecycleState, StatusReport, StopOutcome};
use mg_core::services::registry::Registry;
use mg_core::services::state::TopologyStore;

use common::{config, free_port, spec};

/// Stand in for the bridging tool: a long-lived shell that ignores the
/// bridge arguments appended after `-c`.
fn sleeping_bridge() -> BridgeSettings {
    BridgeSettings {
        command: "sh".into(),
        args: vec!["-c".into(), "exec sleep 30".into()],
    }
}

/// Bind each server's port once its process shows up in the registry, the
/// way a real bridge binds shortly after launch.
fn bind_when_tracked(registry: Registry, targets: Vec<(String, u16)>) {
    tokio::spawn(async move {
        let mut held = Vec::new();
        let mut pending = targets;
        while !pending.is_empty() {
            let mut still_pending = Vec::new();
            for (name, port) in pending {
                if registry.get(&name).await.is_some() {
                    held.push(TcpListener::bind(("0.0.0.0", port)).await.unwrap());
                } else {
                    still_pending.push((name, port));
                }
            }
            pending = still_pending;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Hold the ports for the rest of the test.
        std::future::pending::<()>().await;
    });
}

#[tokio::test]
async fn enabled_servers_run_and_disabled_ones_are_skipped() {
    let (port_a, port_b, port_c) = (free_port().await, free_port().await, free_port().await);
    let mut config = config(vec![
        spec("alpha", port_a, true),
        spec("beta", port_b, true),
        spec("gamma", port_c, false),
    ]);
    config.gateway.bridge = sleeping_bridge();
    config.gateway.settle_ms = 400;
    config.gateway.shutdown_grace_ms = 3000;
    config.gateway.warmup.attempts = 1;
    config.gateway.warmup.timeout_ms = 200;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join(".gateway.pid");
    let mut gateway = Gateway::new(config, TopologyStore::new(&state_path))
        .unwrap()
        .with_publisher_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));
    bind_when_tracked(
        gateway.registry().clone(),
        vec![("alpha".into(), port_a), ("beta".into(), port_b)],
    );

    let summary = gateway.start().await.unwrap();
    assert_eq!(gateway.state(), LifecycleState::Running);

    let statuses: Vec<_> = summary.outcomes.iter().map(|o| (o.name.as_str(), o.status)).collect();
    assert_eq!(
        statuses,
        [
            ("alpha", StartStatus::Running),
            ("beta", StartStatus::Running),
            ("gamma", StartStatus::Disabled),
        ]
    );

    let tracked = gateway.registry().snapshot().await;
    let names: Vec<_> = tracked.iter().map(|r| r.name()).collect();
    assert_eq!(names, ["alpha", "beta"]);
    assert!(tracked.iter().all(|r| r.status == ProcessStatus::Running));

    let persisted = TopologyStore::new(&state_path).load().await.unwrap().unwrap();
    let persisted_names: Vec<_> = persisted.servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(persisted_names, ["alpha", "beta"]);

    let publisher = gateway.publisher_addr().unwrap();
    let doc: Value = reqwest::get(format!("http://127.0.0.1:{}/.mcp.json", publisher.port()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let published = doc["mcpServers"].as_object().unwrap();
    assert!(published.contains_key("alpha"));
    assert!(published.contains_key("beta"));
    assert!(!published.contains_key("gamma"));

    gateway.shutdown().await.unwrap();
    assert_eq!(gateway.state(), LifecycleState::Stopped);
    assert!(gateway.registry().is_empty().await);
    assert!(!state_path.exists());
}

#[tokio::test]
async fn server_that_never_binds_is_reported_failed() {
    let port = free_port().await;
    let mut config = config(vec![spec("quiet", port, true)]);
    config.gateway.bridge = sleeping_bridge();
    config.gateway.settle_ms = 200;

    let dir = tempfile::tempdir().unwrap();
    let mut gateway = Gateway::new(config, TopologyStore::new(dir.path().join("s")))
        .unwrap()
        .with_publisher_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));

    let summary = gateway.start().await.unwrap();
    assert_eq!(summary.outcomes[0].status, StartStatus::Failed);
    assert_eq!(summary.running().count(), 0);
    assert!(summary.warmups.is_empty());

    gateway.shutdown().await.unwrap();
    assert!(gateway.registry().is_empty().await);
}

#[tokio::test]
async fn stop_signals_the_recorded_process_and_clears_the_record() {
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = TopologyStore::new(dir.path().join(".gateway.pid"));
    store
        .save(&PersistedTopology {
            pid: child.id(),
            started: chrono::Utc::now(),
            servers: vec![PersistedServer {
                name: "fs".into(),
                port: 9001,
                status: "running".into(),
            }],
        })
        .await
        .unwrap();

    assert!(matches!(
        gateway::status(&store).await.unwrap(),
        StatusReport::Active { .. }
    ));

    let outcome = gateway::stop(&store).await.unwrap();
    assert_eq!(outcome, StopOutcome::Signalled { pid: child.id() });
    assert_eq!(child.wait().unwrap().signal(), Some(libc::SIGTERM));
    assert!(!store.path().exists());
    assert_eq!(gateway::status(&store).await.unwrap(), StatusReport::NotRunning);
}

#[tokio::test]
async fn signal_during_startup_stops_launching_and_persists_nothing() {
    let mut specs = Vec::new();
    for name in ["one", "two", "three", "four"] {
        specs.push(spec(name, free_port().await, true));
    }
    let mut config = config(specs);
    config.gateway.bridge = sleeping_bridge();
    config.gateway.settle_ms = 400;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join(".gateway.pid");
    let mut gateway = Gateway::new(config, TopologyStore::new(&state_path))
        .unwrap()
        .with_publisher_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));

    let token = gateway.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let started = std::time::Instant::now();
    let summary = gateway.start().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(1200), "{:?}", started.elapsed());
    assert_eq!(summary.outcomes.len(), 1);
    assert!(summary.warmups.is_empty());
    assert!(!state_path.exists());

    gateway.run_until_shutdown().await.unwrap();
    assert_eq!(gateway.state(), LifecycleState::Stopped);
    assert!(gateway.registry().is_empty().await);
}
