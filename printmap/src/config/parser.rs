//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to settings and
//! where the `type` / `matcher` discriminators select strategy variants.

use ini::{Ini, Properties};
use regex::Regex;
use std::net::IpAddr;
use std::str::FromStr;

use super::file::{ConfigFile, ConfigFileError};
use super::proxy::ProxySettings;
use crate::security::{BasicAuthSecurity, HostMatcher, SecurityStrategy};
use crate::tiers::ScaleTable;

/// Prefix of sections describing security strategies, e.g. `[security.wms]`.
const SECURITY_SECTION_PREFIX: &str = "security";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [connections] section
    if let Some(section) = ini.section(Some("connections")) {
        let c = &config.connections;
        let per_host = parse_positive(
            section,
            "connections",
            "per_host_parallel_fetches",
            c.per_host_parallel_fetches(),
        )?;
        let global = parse_positive(
            section,
            "connections",
            "global_parallel_fetches",
            c.global_parallel_fetches(),
        )?;
        let connect_ms = parse_positive(
            section,
            "connections",
            "connection_timeout_ms",
            c.connection_timeout_ms(),
        )?;
        let socket_ms = parse_positive(
            section,
            "connections",
            "socket_timeout_ms",
            c.socket_timeout_ms(),
        )?;
        let proxy = parse_proxy(section)?;

        let mut connections = config
            .connections
            .with_per_host_parallel_fetches(per_host)
            .with_global_parallel_fetches(global)
            .with_connection_timeout_ms(connect_ms)
            .with_socket_timeout_ms(socket_ms);
        if let Some(proxy) = proxy {
            connections = connections.with_proxy(proxy);
        }
        config.connections = connections;
    }

    // [print] section
    if let Some(section) = ini.section(Some("print")) {
        if let Some(v) = section.get("scales") {
            let table = ScaleTable::parse(v).map_err(|e| ConfigFileError::InvalidValue {
                section: "print".to_string(),
                key: "scales".to_string(),
                value: v.to_string(),
                reason: e.to_string(),
            })?;
            config.scales = Some(table);
        }
    }

    // [security.*] sections, in file order
    for (name, section) in ini.iter() {
        let Some(name) = name else { continue };
        if is_security_section(name) {
            config.security.push(parse_strategy(name, section)?);
        }
    }

    Ok(config)
}

fn is_security_section(name: &str) -> bool {
    name == SECURITY_SECTION_PREFIX
        || name
            .strip_prefix(SECURITY_SECTION_PREFIX)
            .is_some_and(|rest| rest.starts_with('.'))
}

fn parse_strategy(name: &str, section: &Properties) -> Result<SecurityStrategy, ConfigFileError> {
    let kind = require(section, name, "type")?;

    let strategy = match kind.to_lowercase().as_str() {
        "basicauth" => {
            let preemptive = match section.get("preemptive") {
                Some(v) => parse_bool(v).ok_or_else(|| invalid(name, "preemptive", v, "must be 'true' or 'false'"))?,
                None => false,
            };
            let settings = BasicAuthSecurity::from_parts(
                section.get("username").map(str::to_string),
                section.get("password").map(str::to_string),
                preemptive,
            );
            SecurityStrategy::basic_auth(settings).map_err(|source| ConfigFileError::Security {
                section: name.to_string(),
                source,
            })?
        }
        "noauth" => SecurityStrategy::no_auth(),
        _ => {
            return Err(invalid(name, "type", kind, "must be one of: basicAuth, noAuth"));
        }
    };

    match parse_matcher(name, section)? {
        Some(matcher) => Ok(strategy.with_matcher(matcher)),
        None => Ok(strategy),
    }
}

fn parse_matcher(name: &str, section: &Properties) -> Result<Option<HostMatcher>, ConfigFileError> {
    let Some(kind) = section.get("matcher") else {
        return Ok(None);
    };
    let port = parse_optional::<u16>(section, name, "port", "must be a port number")?;

    let matcher = match kind.to_lowercase().as_str() {
        "acceptall" => HostMatcher::AcceptAll,
        "dns" => {
            let host = require(section, name, "host")?.to_string();
            let path_regex = match section.get("path_regex") {
                Some(v) => Some(
                    Regex::new(v).map_err(|e| invalid(name, "path_regex", v, &e.to_string()))?,
                ),
                None => None,
            };
            HostMatcher::Dns {
                host,
                port,
                path_regex,
            }
        }
        "localhost" => HostMatcher::LocalHost { port },
        "address" => {
            let ip = parse_ip(section, name, "ip")?;
            let mask = parse_ip(section, name, "mask")?;
            if ip.is_ipv4() != mask.is_ipv4() {
                return Err(invalid(
                    name,
                    "mask",
                    &mask.to_string(),
                    "must be the same address family as ip",
                ));
            }
            HostMatcher::Address { ip, mask, port }
        }
        _ => {
            return Err(invalid(
                name,
                "matcher",
                kind,
                "must be one of: acceptAll, dns, localhost, address",
            ));
        }
    };

    Ok(Some(matcher))
}

fn parse_ip(section: &Properties, name: &str, key: &str) -> Result<IpAddr, ConfigFileError> {
    let v = require(section, name, key)?;
    v.parse()
        .map_err(|_| invalid(name, key, v, "must be an IP address"))
}

/// `proxy` and `no_proxy` from `[connections]`. `no_proxy` without a proxy
/// is rejected.
fn parse_proxy(section: &Properties) -> Result<Option<ProxySettings>, ConfigFileError> {
    let no_proxy = section.get("no_proxy");
    let Some(v) = section.get("proxy") else {
        return match no_proxy {
            Some(hosts) => Err(invalid(
                "connections",
                "no_proxy",
                hosts,
                "requires a proxy",
            )),
            None => Ok(None),
        };
    };
    let proxy = ProxySettings::parse(v)
        .map_err(|e| invalid("connections", "proxy", v, &e.to_string()))?;
    Ok(Some(match no_proxy {
        Some(hosts) => proxy.with_no_proxy(
            hosts
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|h| !h.is_empty()),
        ),
        None => proxy,
    }))
}

fn parse_positive<T>(
    section: &Properties,
    name: &str,
    key: &str,
    default: T,
) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(v) = section.get(key) else {
        return Ok(default);
    };
    match v.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(invalid(name, key, v, "must be a positive integer")),
    }
}

fn parse_optional<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, key, v, reason)),
        None => Ok(None),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn require<'a>(section: &'a Properties, name: &str, key: &str) -> Result<&'a str, ConfigFileError> {
    section.get(key).ok_or_else(|| ConfigFileError::MissingKey {
        section: name.to_string(),
        key: key.to_string(),
    })
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigFile, ConfigFileError};
    use crate::security::{HostMatcher, SecurityError, StrategyKind};
    use url::Url;

    const SAMPLE: &str = r#"
[connections]
per_host_parallel_fetches = 4
global_parallel_fetches = 12
connection_timeout_ms = 2400000
socket_timeout_ms = 2400000

[print]
scales = 25000, 50000, 100000, 200000

[security.preemptive]
type = basicAuth
matcher = dns
host = c2cpc61.camptocamp.com
port = 80
username = xyz
password = yxz
preemptive = true

[security.challenge]
type = basicAuth
matcher = dns
host = c2cpc42.camptocamp.com
username = xyz
password = yxz

[security.lan]
type = noAuth
matcher = address
ip = 192.168.0.0
mask = 255.255.0.0
"#;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = ConfigFile::parse(SAMPLE).unwrap();

        assert_eq!(config.connections.per_host_parallel_fetches(), 4);
        assert_eq!(config.connections.global_parallel_fetches(), 12);
        assert_eq!(config.connections.connection_timeout_ms(), 2_400_000);
        assert!(config.connections.proxy().is_none());
        assert_eq!(config.scales.as_ref().unwrap().best_scale(25000.1), 25000.0);

        assert_eq!(config.security.len(), 3);
        assert!(matches!(config.security[0].kind(), StrategyKind::BasicAuth(b) if b.is_preemptive()));
        assert!(matches!(config.security[1].kind(), StrategyKind::BasicAuth(b) if !b.is_preemptive()));
        assert!(matches!(
            config.security[2].matcher(),
            Some(HostMatcher::Address { .. })
        ));
    }

    #[tokio::test]
    async fn test_sample_resolver_contexts() {
        let resolver = ConfigFile::parse(SAMPLE).unwrap().security_resolver();

        let preemptive = url("http://c2cpc61.camptocamp.com");
        let context = resolver.resolve(&preemptive).await.unwrap();
        let creds = context.credentials_for(&preemptive).unwrap();
        assert_eq!(creds.username, "xyz");
        assert_eq!(creds.password, "yxz");
        assert!(context.auth_cache().is_some());

        let challenge = url("http://c2cpc42.camptocamp.com");
        assert!(resolver.resolve(&challenge).await.unwrap().auth_cache().is_none());
    }

    #[test]
    fn test_missing_password_is_fatal() {
        let text = "[security.broken]\ntype = basicAuth\nusername = xyz\n";
        let err = ConfigFile::parse(text).unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::Security {
                source: SecurityError::MissingCredentials,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let text = "[security.x]\ntype = kerberos\n";
        let err = ConfigFile::parse(text).unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "type"));
    }

    #[test]
    fn test_missing_type_rejected() {
        let err = ConfigFile::parse("[security]\nusername = a\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::MissingKey { ref key, .. } if key == "type"));
    }

    #[test]
    fn test_unknown_matcher_rejected() {
        let text = "[security.x]\ntype = noAuth\nmatcher = wildcard\n";
        assert!(ConfigFile::parse(text).is_err());
    }

    #[test]
    fn test_dns_matcher_requires_host() {
        let text = "[security.x]\ntype = noAuth\nmatcher = dns\n";
        let err = ConfigFile::parse(text).unwrap_err();
        assert!(matches!(err, ConfigFileError::MissingKey { ref key, .. } if key == "host"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let text = "[connections]\nglobal_parallel_fetches = 0\n";
        assert!(matches!(
            ConfigFile::parse(text),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_proxy_applies_to_every_target() {
        let text = "[connections]\nproxy = http://mapfishprint.org:8080\n";
        let config = ConfigFile::parse(text).unwrap();
        let proxy = config.connections.proxy().unwrap();
        let expected = url("http://mapfishprint.org:8080");

        assert_eq!(proxy.proxy_for(&url("http://localhost:8080/wms")), Some(&expected));
        assert_eq!(proxy.proxy_for(&url("https://tiles.example.com/1.png")), Some(&expected));
    }

    #[test]
    fn test_no_proxy_hosts_bypass() {
        let text = "[connections]\nproxy = http://mapfishprint.org:8080\nno_proxy = localhost, .internal.example.com\n";
        let config = ConfigFile::parse(text).unwrap();
        let proxy = config.connections.proxy().unwrap();

        assert_eq!(proxy.no_proxy(), &["localhost", "internal.example.com"]);
        assert!(proxy.proxy_for(&url("http://localhost/wms")).is_none());
        assert!(proxy.proxy_for(&url("http://maps.internal.example.com/")).is_none());
        assert!(proxy.proxy_for(&url("http://example.com/")).is_some());
    }

    #[test]
    fn test_malformed_proxy_rejected() {
        let text = "[connections]\nproxy = socks5://mapfishprint.org:1080\n";
        let err = ConfigFile::parse(text).unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "proxy"));
    }

    #[test]
    fn test_no_proxy_requires_proxy() {
        let text = "[connections]\nno_proxy = localhost\n";
        let err = ConfigFile::parse(text).unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "no_proxy"));
    }

    #[test]
    fn test_malformed_scales_rejected() {
        let text = "[print]\nscales = 25000, lots\n";
        assert!(ConfigFile::parse(text).is_err());
    }

    #[test]
    fn test_unrelated_sections_ignored() {
        let text = "[securityish]\ntype = bogus\n\n[other]\nkey = value\n";
        let config = ConfigFile::parse(text).unwrap();
        assert!(config.security.is_empty());
    }
}
