//! Outbound proxy selection.

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("invalid proxy url '{0}'")]
    InvalidUrl(String),

    #[error("unsupported proxy scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
}

/// Proxy used for outbound requests, with hosts that bypass it.
///
/// `no_proxy` entries match a host exactly or any of its subdomains, so
/// `example.com` and `.example.com` both cover `tiles.example.com`. A single
/// `*` bypasses the proxy for every host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    url: Url,
    no_proxy: Vec<String>,
}

impl ProxySettings {
    /// Parses an `http://` or `https://` proxy URL.
    pub fn parse(text: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(text.trim()).map_err(|_| ProxyError::InvalidUrl(text.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(ProxyError::InvalidUrl(text.to_string()));
        }
        Ok(Self {
            url,
            no_proxy: Vec::new(),
        })
    }

    /// Adds hosts that are reached directly.
    pub fn with_no_proxy<S: AsRef<str>>(mut self, hosts: impl IntoIterator<Item = S>) -> Self {
        self.no_proxy.extend(
            hosts
                .into_iter()
                .map(|h| h.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty()),
        );
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn no_proxy(&self) -> &[String] {
        &self.no_proxy
    }

    /// Proxy to use for `target`, or `None` to connect directly.
    pub fn proxy_for(&self, target: &Url) -> Option<&Url> {
        let Some(host) = target.host_str() else {
            return Some(&self.url);
        };
        let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();
        let bypass = self.no_proxy.iter().any(|entry| {
            entry == "*"
                || host == *entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if bypass {
            None
        } else {
            Some(&self.url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_every_target_uses_proxy() {
        let proxy = ProxySettings::parse("http://mapfishprint.org:8080").unwrap();

        let chosen = proxy.proxy_for(&url("http://localhost:8080/wms")).unwrap();
        assert_eq!(chosen.host_str(), Some("mapfishprint.org"));
        assert_eq!(chosen.port(), Some(8080));
    }

    #[test]
    fn test_no_proxy_hosts_bypass() {
        let proxy = ProxySettings::parse("http://proxy.local:3128")
            .unwrap()
            .with_no_proxy(["localhost", ".Internal.example.com", " "]);

        assert_eq!(proxy.no_proxy(), &["localhost", "internal.example.com"]);
        assert_eq!(proxy.proxy_for(&url("http://localhost/x")), None);
        assert_eq!(proxy.proxy_for(&url("http://internal.example.com/x")), None);
        assert_eq!(proxy.proxy_for(&url("http://tiles.internal.example.com/x")), None);
        assert!(proxy.proxy_for(&url("http://notinternal.example.com/x")).is_some());
        assert!(proxy.proxy_for(&url("http://tiles.example.com/x")).is_some());
    }

    #[test]
    fn test_wildcard_bypasses_everything() {
        let proxy = ProxySettings::parse("http://proxy.local:3128")
            .unwrap()
            .with_no_proxy(["*"]);
        assert_eq!(proxy.proxy_for(&url("http://tiles.example.com/x")), None);
    }

    #[test]
    fn test_rejects_bad_proxy_urls() {
        assert!(matches!(ProxySettings::parse("not a url"), Err(ProxyError::InvalidUrl(_))));
        assert_eq!(
            ProxySettings::parse("socks5://proxy.local:1080"),
            Err(ProxyError::UnsupportedScheme("socks5".to_string()))
        );
    }
}
