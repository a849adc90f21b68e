// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use mg_core::models::{GatewayConfig, ServerSpec};

pub fn spec(name: &str, port: u16, enabled: bool) -> ServerSpec {
    ServerSpec {
        name: name.into(),
        command: "npx".into(),
        args: vec!["-y".into(), format!("@mcp/{name}")],
        port,
        enabled,
        description: String::new(),
    }
}

pub fn config(servers: Vec<ServerSpec>) -> GatewayConfig {
    let mut config = GatewayConfig {
        servers,
        gateway: Default::default(),
    };
    config.gateway.public_host = Some("10.9.8.7".into());
    config
}

/// A port nothing is listening on right now.
pub async fn free_port() -> u16 {
    TcpListener::bind("0.0.0.0:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Serve `router` on an ephemeral loopback port in the background.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
