//! Host matchers deciding which URLs a security strategy applies to.

use super::effective_port;
use super::error::MatchError;
use regex::Regex;
use std::net::IpAddr;
use url::{Host, Url};

/// Pattern over the scheme, host and port of a target URL.
///
/// The variant is picked by the `matcher` key when configuration is loaded.
#[derive(Debug, Clone)]
pub enum HostMatcher {
    /// Matches every URL
    AcceptAll,

    /// Matches a host name (case-insensitive), optionally restricted to a
    /// port and a path pattern
    Dns {
        host: String,
        port: Option<u16>,
        path_regex: Option<Regex>,
    },

    /// Matches loopback hosts (`localhost`, `127.0.0.0/8`, `::1`)
    LocalHost { port: Option<u16> },

    /// Matches hosts whose resolved address falls inside `ip`/`mask`.
    ///
    /// Host names are resolved through the system resolver.
    Address {
        ip: IpAddr,
        mask: IpAddr,
        port: Option<u16>,
    },
}

impl HostMatcher {
    /// Matcher for a single host name on any port.
    pub fn dns(host: impl Into<String>) -> Self {
        HostMatcher::Dns {
            host: host.into(),
            port: None,
            path_regex: None,
        }
    }

    /// Restricts the matcher to one port. No effect on [`HostMatcher::AcceptAll`].
    pub fn with_port(self, port: u16) -> Self {
        match self {
            HostMatcher::Dns {
                host, path_regex, ..
            } => HostMatcher::Dns {
                host,
                port: Some(port),
                path_regex,
            },
            HostMatcher::LocalHost { .. } => HostMatcher::LocalHost { port: Some(port) },
            HostMatcher::Address { ip, mask, .. } => HostMatcher::Address {
                ip,
                mask,
                port: Some(port),
            },
            HostMatcher::AcceptAll => HostMatcher::AcceptAll,
        }
    }

    /// Checks whether `url` is covered by this matcher.
    ///
    /// Only [`HostMatcher::Address`] performs I/O and can fail. Its lookup
    /// goes through `tokio::net::lookup_host`, off the runtime workers.
    pub async fn validate(&self, url: &Url) -> Result<bool, MatchError> {
        match self {
            HostMatcher::AcceptAll => Ok(true),

            HostMatcher::Dns {
                host,
                port,
                path_regex,
            } => {
                let Some(url_host) = url.host_str() else {
                    return Ok(false);
                };
                let host_ok = url_host
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .eq_ignore_ascii_case(host);
                let path_ok = path_regex
                    .as_ref()
                    .map_or(true, |re| re.is_match(url.path()));
                Ok(host_ok && port_matches(*port, url) && path_ok)
            }

            HostMatcher::LocalHost { port } => {
                let local = match url.host() {
                    Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
                    Some(Host::Ipv4(ip)) => ip.is_loopback(),
                    Some(Host::Ipv6(ip)) => ip.is_loopback(),
                    None => false,
                };
                Ok(local && port_matches(*port, url))
            }

            HostMatcher::Address { ip, mask, port } => {
                if !port_matches(*port, url) {
                    return Ok(false);
                }
                let addresses = resolve_host(url).await?;
                Ok(addresses
                    .iter()
                    .any(|candidate| same_network(*candidate, *ip, *mask)))
            }
        }
    }
}

fn port_matches(expected: Option<u16>, url: &Url) -> bool {
    match expected {
        Some(port) => effective_port(url) == Some(port),
        None => true,
    }
}

async fn resolve_host(url: &Url) -> Result<Vec<IpAddr>, MatchError> {
    match url.host() {
        Some(Host::Ipv4(ip)) => Ok(vec![IpAddr::V4(ip)]),
        Some(Host::Ipv6(ip)) => Ok(vec![IpAddr::V6(ip)]),
        Some(Host::Domain(domain)) => {
            let port = effective_port(url).unwrap_or(80);
            tokio::net::lookup_host((domain, port))
                .await
                .map(|addrs| addrs.map(|addr| addr.ip()).collect())
                .map_err(|e| MatchError::Resolve {
                    host: domain.to_string(),
                    message: e.to_string(),
                })
        }
        None => Err(MatchError::NoHost(url.to_string())),
    }
}

fn same_network(candidate: IpAddr, network: IpAddr, mask: IpAddr) -> bool {
    match (candidate, network, mask) {
        (IpAddr::V4(c), IpAddr::V4(n), IpAddr::V4(m)) => {
            let m = u32::from(m);
            u32::from(c) & m == u32::from(n) & m
        }
        (IpAddr::V6(c), IpAddr::V6(n), IpAddr::V6(m)) => {
            let m = u128::from(m);
            u128::from(c) & m == u128::from(n) & m
        }
        _ => false,
    }
}
