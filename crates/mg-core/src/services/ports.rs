use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Free,
    Bound,
}

/// Probe a port by binding a listener on all interfaces and releasing it
/// immediately. Any bind error counts as bound.
pub async fn probe(port: u16) -> PortState {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            drop(listener);
            PortState::Free
        }
        Err(e) => {
            tracing::trace!(port, error = %e, "port_bound");
            PortState::Bound
        }
    }
}

pub async fn is_in_use(port: u16) -> bool {
    probe(port).await == PortState::Bound
}
