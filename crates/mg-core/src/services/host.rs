use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

const FALLBACK_HOST: &str = "localhost";

/// Best guess at the address other machines use to reach this host.
///
/// Uses the configured override if present, otherwise the local address of
/// the default route (a connected UDP socket sends nothing), otherwise
/// `localhost`.
pub fn detect(public_host: Option<&str>) -> String {
    if let Some(host) = public_host.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    match outbound_address() {
        Some(ip) => ip.to_string(),
        None => FALLBACK_HOST.to_string(),
    }
}

fn outbound_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(("192.0.2.1", 9)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified() && !ip.is_loopback()).then_some(ip)
}

/// Collapse IPv4-mapped IPv6 (`::ffff:a.b.c.d`) to plain IPv4.
pub fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 => v4,
    }
}

/// Host component for a URL: IPv6 addresses are bracketed.
pub fn url_host(ip: IpAddr) -> String {
    match normalize(ip) {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

/// The host a given server-side socket address should be advertised as.
pub fn advertised(local: Option<SocketAddr>, fallback: &str) -> String {
    match local {
        Some(addr) if !addr.ip().is_unspecified() => url_host(addr.ip()),
        _ => fallback.to_string(),
    }
}
