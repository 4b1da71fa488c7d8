//! SSRF Guard (spec.md §4.3).
//!
//! Installed as a custom DNS resolver on the `reqwest::Client` used for
//! Profile Discovery and Client Discovery. `reqwest` re-invokes the
//! resolver for every connection attempt — including each hop of a
//! redirect chain — so filtering candidate addresses here enforces the
//! check at connect time rather than trusting a single upfront DNS lookup,
//! which defeats both TOCTOU races and SSRF-via-redirect.

use ipnetwork::{Ipv4Network, Ipv6Network};
use once_cell::sync::Lazy;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

static BLOCKED_V4: Lazy<Vec<Ipv4Network>> = Lazy::new(|| {
    [
        "127.0.0.0/8",    // loopback
        "169.254.0.0/16", // link-local, includes 169.254.169.254 cloud metadata
        "10.0.0.0/8",     // RFC 1918
        "172.16.0.0/12",  // RFC 1918
        "192.168.0.0/16", // RFC 1918
        "100.64.0.0/10",  // CGNAT (RFC 6598)
        "224.0.0.0/4",    // multicast
        "192.0.2.0/24",   // TEST-NET-1
        "198.51.100.0/24", // TEST-NET-2
        "203.0.113.0/24", // TEST-NET-3
        "0.0.0.0/8",      // "this network"
    ]
    .iter()
    .map(|cidr| cidr.parse().expect("static CIDR literal"))
    .collect()
});

static BLOCKED_V6: Lazy<Vec<Ipv6Network>> = Lazy::new(|| {
    ["::1/128", "fe80::/10", "fc00::/7", "ff00::/8", "2001:db8::/32"]
        .iter()
        .map(|cidr| cidr.parse().expect("static CIDR literal"))
        .collect()
});

/// True if `ip` falls in any blocked range (spec.md §4.3). Recurses once
/// through an IPv4-mapped IPv6 address so `::ffff:127.0.0.1` is caught too.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_blocked_v4(mapped);
            }
            BLOCKED_V6.iter().any(|net| net.contains(v6))
        }
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    BLOCKED_V4.iter().any(|net| net.contains(ip))
}

/// Custom resolver that filters out blocked addresses before `reqwest`
/// connects. If every resolved address is blocked, resolution fails and
/// the caller sees a transport error (spec.md §4.3 "Failure mode").
#[derive(Clone, Default)]
pub struct SsrfGuardResolver;

impl Resolve for SsrfGuardResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_owned();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
                .collect();

            let allowed: Vec<SocketAddr> =
                addrs.into_iter().filter(|addr| !is_blocked_ip(addr.ip())).collect();

            if allowed.is_empty() {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("SSRF guard: no permitted address for host '{host}'"),
                )) as Box<dyn std::error::Error + Send + Sync>);
            }

            Ok(Box::new(allowed.into_iter()) as Addrs)
        })
    }
}

/// Builds the shared `reqwest::Client` used by Profile Discovery and
/// Client Discovery: SSRF-guarded, bounded timeout, identifying
/// user-agent. Redirects are followed (up to a small limit) because the
/// resolver above re-runs the blocklist check on every hop, which is what
/// catches SSRF-via-redirect rather than disabling redirects outright.
pub fn guarded_client(user_agent: &str, timeout: std::time::Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .dns_resolver(Arc::new(SsrfGuardResolver))
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .user_agent(user_agent.to_owned())
        .build()
}
