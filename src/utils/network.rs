//! Network utilities
//!
//! Provides listen-address helpers.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// URLs to print for a bound address. Wildcard binds also get a localhost URL.
pub fn display_urls(addr: SocketAddr) -> Vec<String> {
    let mut urls = vec![format!("http://{}/", addr)];
    if addr.ip().is_unspecified() || addr.ip().is_loopback() {
        let local = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port());
        if local != addr {
            urls.push(format!("http://localhost:{}/", addr.port()));
        }
    }
    urls
}
