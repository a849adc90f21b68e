use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::connect_info::Connected;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::serve::IncomingStream;
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::{GatewayError, Result};
use crate::models::{ClientSettings, GatewayConfig, ServerSpec};

use super::host;
use super::registry::{CapabilityCache, Registry};

/// Paths that all serve the client configuration document.
pub const CONFIG_PATHS: [&str; 3] = ["/config", "/config.json", "/.mcp.json"];

/// How one accepted connection reached the publisher.
#[derive(Debug, Clone, Copy)]
pub struct ClientView {
    /// Server-side address of the socket: the address this client dialed.
    pub local: Option<SocketAddr>,
    pub peer: SocketAddr,
}

impl ClientView {
    pub fn host(&self, fallback: &str) -> String {
        host::advertised(self.local, fallback)
    }
}

impl Connected<IncomingStream<'_>> for ClientView {
    fn connect_info(target: IncomingStream<'_>) -> Self {
        Self {
            local: target.local_addr().ok(),
            peer: target.remote_addr(),
        }
    }
}

/// The `.mcp.json` document handed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, ClientInvocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInvocation {
    pub command: String,
    pub args: Vec<String>,
}

pub fn sse_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/sse")
}

/// Describe how to reach every enabled server from `host`'s side.
pub fn render_client_config<'a, I>(servers: I, client: &ClientSettings, host: &str) -> ClientConfig
where
    I: IntoIterator<Item = &'a ServerSpec>,
{
    let mcp_servers = servers
        .into_iter()
        .filter(|s| s.enabled)
        .map(|s| {
            let mut args = client.args.clone();
            args.push(sse_url(host, s.port));
            args.extend(client.trailing_args.iter().cloned());
            (
                s.name.clone(),
                ClientInvocation {
                    command: client.command.clone(),
                    args,
                },
            )
        })
        .collect();
    ClientConfig { mcp_servers }
}

pub fn render_help(config_port: u16) -> String {
    format!(
        "MCP Gateway Config Server

Endpoints:
  GET /config.json - client config for .mcp.json (also /config, /.mcp.json)
  GET /status      - live servers and cached tool counts

Usage from WSL:
  curl http://<HOST_IP>:{config_port}/config.json > .mcp.json

Finding the host IP from WSL:
  ip route | grep default | awk '{{print $3}}'
"
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusDocument {
    pub servers: Vec<ServerStatusEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerStatusEntry {
    pub name: String,
    pub port: u16,
    pub status: crate::models::ProcessStatus,
    pub tools: Option<usize>,
}

#[derive(Clone)]
pub struct PublisherState {
    servers: Arc<Vec<ServerSpec>>,
    client: Arc<ClientSettings>,
    fallback_host: Arc<str>,
    config_port: u16,
    registry: Registry,
    capabilities: CapabilityCache,
}

impl PublisherState {
    pub fn new(
        config: &GatewayConfig,
        fallback_host: &str,
        registry: Registry,
        capabilities: CapabilityCache,
    ) -> Self {
        Self {
            servers: Arc::new(config.enabled_servers().cloned().collect()),
            client: Arc::new(config.gateway.client.clone()),
            fallback_host: Arc::from(fallback_host),
            config_port: config.gateway.config_port,
            registry,
            capabilities,
        }
    }
}

pub fn router(state: PublisherState) -> Router {
    let mut router = Router::new().route("/", get(help)).route("/status", get(status));
    for path in CONFIG_PATHS {
        router = router.route(path, get(client_config));
    }
    router
        .fallback(not_found)
        .layer(middleware::map_response(cors_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn cors_headers<B>(mut response: Response<B>) -> Response<B> {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    response
}

async fn help(State(state): State<PublisherState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_help(state.config_port),
    )
}

async fn client_config(
    State(state): State<PublisherState>,
    ConnectInfo(view): ConnectInfo<ClientView>,
) -> Response {
    let host = view.host(&state.fallback_host);
    tracing::debug!(peer = %view.peer, %host, "config_requested");
    let document = render_client_config(state.servers.iter(), &state.client, &host);
    match serde_json::to_string_pretty(&document) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn status(State(state): State<PublisherState>) -> Json<StatusDocument> {
    let mut servers = Vec::new();
    for record in state.registry.snapshot().await {
        servers.push(ServerStatusEntry {
            name: record.name().to_string(),
            port: record.port,
            status: record.status,
            tools: state.capabilities.count(record.name()).await,
        });
    }
    Json(StatusDocument { servers })
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

/// A publisher accepting connections in the background.
pub struct RunningPublisher {
    local_addr: SocketAddr,
    token: CancellationToken,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl RunningPublisher {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait briefly for in-flight requests.
    pub async fn stop(self) {
        self.token.cancel();
        let mut task = self.task;
        match tokio::time::timeout(Duration::from_secs(5), &mut task).await {
            Ok(Ok(Ok(()))) => tracing::debug!("config_server_stopped"),
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "config server error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "config server task failed"),
            Err(_) => {
                tracing::warn!("config server did not drain in time");
                task.abort();
            }
        }
    }
}

/// Bind the control-plane port and serve in the background until `token`
/// is cancelled. A bind failure is fatal to the caller.
pub async fn start(
    bind: SocketAddr,
    state: PublisherState,
    token: CancellationToken,
) -> Result<RunningPublisher> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|source| GatewayError::PublisherBind {
            port: bind.port(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    let app = router(state).into_make_service_with_connect_info::<ClientView>();
    let shutdown = token.clone();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    Ok(RunningPublisher {
        local_addr,
        token,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn spec(name: &str, port: u16, enabled: bool) -> ServerSpec {
        ServerSpec {
            name: name.into(),
            command: "npx".into(),
            args: vec![],
            port,
            enabled,
            description: String::new(),
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            servers: vec![
                spec("alpha", 9001, true),
                spec("beta", 9002, true),
                spec("gamma", 9003, false),
            ],
            gateway: Default::default(),
        }
    }

    fn state() -> PublisherState {
        PublisherState::new(&config(), "10.0.0.5", Registry::new(), CapabilityCache::new())
    }

    fn view(local: [u8; 4]) -> ClientView {
        ClientView {
            local: Some(SocketAddr::from((Ipv4Addr::from(local), 8930))),
            peer: SocketAddr::from((Ipv4Addr::new(172, 20, 16, 9), 50123)),
        }
    }

    async fn get_path(path: &str, view: ClientView) -> Response {
        let request = Request::builder()
            .uri(path)
            .extension(ConnectInfo(view))
            .body(Body::empty())
            .unwrap();
        router(state()).oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn rendered_document_lists_enabled_servers() {
        let document =
            render_client_config(&config().servers, &ClientSettings::default(), "172.20.16.1");
        let names: Vec<_> = document.mcp_servers.keys().cloned().collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        let alpha = &document.mcp_servers["alpha"];
        assert_eq!(alpha.command, "npx");
        assert_eq!(
            alpha.args,
            vec!["-y", "mcp-remote", "http://172.20.16.1:9001/sse", "--allow-http"]
        );
    }

    #[test]
    fn document_uses_mcp_servers_key() {
        let document = render_client_config(&config().servers, &ClientSettings::default(), "h");
        let json = serde_json::to_value(&document).unwrap();
        assert!(json["mcpServers"]["beta"]["args"].is_array());
    }

    #[test]
    fn help_page_text() {
        insta::assert_snapshot!(render_help(8930), @r###"
        MCP Gateway Config Server

        Endpoints:
          GET /config.json - client config for .mcp.json (also /config, /.mcp.json)
          GET /status      - live servers and cached tool counts

        Usage from WSL:
          curl http://<HOST_IP>:8930/config.json > .mcp.json

        Finding the host IP from WSL:
          ip route | grep default | awk '{print $3}'
        "###);
    }

    #[tokio::test]
    async fn every_alias_serves_the_document() {
        for path in CONFIG_PATHS {
            let response = get_path(path, view([172, 20, 16, 1])).await;
            assert_eq!(response.status(), StatusCode::OK, "{path}");
            assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
            let document: ClientConfig = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(document.mcp_servers.len(), 2);
        }
    }

    #[tokio::test]
    async fn document_host_follows_the_dialed_address() {
        let first: ClientConfig =
            serde_json::from_str(&body_text(get_path("/config.json", view([172, 20, 16, 1])).await).await)
                .unwrap();
        let second: ClientConfig =
            serde_json::from_str(&body_text(get_path("/config.json", view([192, 168, 1, 20])).await).await)
                .unwrap();
        assert_eq!(first.mcp_servers["alpha"].args[2], "http://172.20.16.1:9001/sse");
        assert_eq!(second.mcp_servers["alpha"].args[2], "http://192.168.1.20:9001/sse");
    }

    #[tokio::test]
    async fn missing_local_address_uses_fallback_host() {
        let view = ClientView {
            local: None,
            peer: SocketAddr::from((Ipv4Addr::LOCALHOST, 50000)),
        };
        let document: ClientConfig =
            serde_json::from_str(&body_text(get_path("/.mcp.json", view).await).await).unwrap();
        assert_eq!(document.mcp_servers["beta"].args[2], "http://10.0.0.5:9002/sse");
    }

    #[tokio::test]
    async fn unknown_path_is_404_with_cors() {
        let response = get_path("/nope", view([127, 0, 0, 1])).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
        assert_eq!(body_text(response).await, "Not found");
    }

    #[tokio::test]
    async fn help_page_is_plain_text_with_cors() {
        let response = get_path("/", view([127, 0, 0, 1])).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(body_text(response).await.contains(":8930/config.json"));
    }

    #[tokio::test]
    async fn status_reports_empty_registry() {
        let response = get_path("/status", view([127, 0, 0, 1])).await;
        let document: StatusDocument = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(document.servers.is_empty());
    }

    #[tokio::test]
    async fn bind_failure_is_publisher_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let result = start(addr, state(), CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(GatewayError::PublisherBind { port, .. }) if port == addr.port()
        ));
    }
}
