use std::net::{IpAddr, SocketAddr};

use tokio::net::lookup_host;

use crate::error::NtpError;

/// Resolve the IP address for a host name according to IPv4/IPv6 mode.
///
/// IPv4 addresses are preferred unless `ipv6_only` is set, in which case
/// only IPv6 addresses are accepted.
pub async fn resolve_ip(target: &str, port: u16, ipv6_only: bool) -> Result<IpAddr, NtpError> {
    let addrs: Vec<SocketAddr> = lookup_host((target, port))
        .await
        .map_err(|e| NtpError::Dns(format!("'{target}': {e}")))?
        .collect();

    let filtered: Vec<IpAddr> = if ipv6_only {
        addrs
            .iter()
            .map(|a| a.ip())
            .filter(|ip| ip.is_ipv6())
            .collect()
    } else {
        let (v4, v6): (Vec<IpAddr>, Vec<IpAddr>) =
            addrs.iter().map(|a| a.ip()).partition(|ip| ip.is_ipv4());
        v4.into_iter().chain(v6).collect()
    };

    filtered.into_iter().next().ok_or_else(|| {
        if ipv6_only {
            NtpError::Dns(format!("No IPv6 address found for '{}'", target))
        } else {
            NtpError::Dns(format!("No IP address found for '{}'", target))
        }
    })
}
