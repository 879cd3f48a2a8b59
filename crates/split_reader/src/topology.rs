//! Replica ordering for split connections.
//!
//! Readers connect to one replica of their split. Local replicas are tried
//! first so scans avoid a network hop when the job runs beside the data.

use std::net::IpAddr;

/// Returns `replicas` with local endpoints first. The sort is stable, so
/// the relative order within each group is kept.
pub fn ordered_replicas(replicas: &[String], local_addresses: &[String]) -> Vec<String> {
    let mut ordered = replicas.to_vec();
    ordered.sort_by_key(|endpoint| !is_local(endpoint, local_addresses));
    ordered
}

/// Returns `true` for loopback endpoints and configured local addresses.
pub fn is_local(endpoint: &str, local_addresses: &[String]) -> bool {
    let host = endpoint_host(endpoint);
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    if let Ok(addr) = host.parse::<IpAddr>() {
        if addr.is_loopback() {
            return true;
        }
    }
    local_addresses
        .iter()
        .any(|local| endpoint_host(local).eq_ignore_ascii_case(host))
}

/// Strips an optional port (`host:port`, `[v6]:port`).
fn endpoint_host(endpoint: &str) -> &str {
    let endpoint = endpoint.trim();
    if let Some(rest) = endpoint.strip_prefix('[') {
        // Decision: bracketed v6 literal; anything after `]` is a port.
        return rest.split(']').next().unwrap_or(rest);
    }
    match endpoint.rsplit_once(':') {
        // A bare v6 literal has several colons and no port.
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => endpoint,
    }
}
