//! Per-request authentication state.

use super::effective_port;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Host and port a set of credentials is valid for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthScope {
    pub host: String,
    pub port: u16,
}

impl AuthScope {
    /// Scope covering exactly the host and port of `url`.
    pub fn for_url(url: &Url) -> Option<Self> {
        Some(Self {
            host: url.host_str()?.to_ascii_lowercase(),
            port: effective_port(url)?,
        })
    }
}

/// Credentials bound to one [`AuthScope`].
#[derive(Clone, PartialEq, Eq)]
pub struct ScopedCredentials {
    pub scope: AuthScope,
    pub username: String,
    pub password: String,
}

impl ScopedCredentials {
    /// `Authorization` header value for the Basic scheme.
    pub fn basic_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl fmt::Debug for ScopedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCredentials")
            .field("scope", &self.scope)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Scheme, host and port identifying a connection target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl AuthTarget {
    pub fn for_url(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: effective_port(url)?,
        })
    }
}

/// Authentication schemes that can be cached for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
}

/// Known authentication schemes per target.
///
/// An entry tells the fetcher to send credentials on the first request
/// instead of waiting for a `401` challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCache {
    entries: HashMap<AuthTarget, AuthScheme>,
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, target: AuthTarget, scheme: AuthScheme) {
        self.entries.insert(target, scheme);
    }

    pub fn get(&self, target: &AuthTarget) -> Option<AuthScheme> {
        self.entries.get(target).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Authentication state for a single outbound request.
///
/// Built fresh by the matching strategy for every request and consumed by
/// the fetcher. Never cached across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    credentials: Option<ScopedCredentials>,
    auth_cache: Option<AuthCache>,
}

impl RequestContext {
    /// Context that sends no credentials.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: ScopedCredentials) -> Self {
        Self {
            credentials: Some(credentials),
            auth_cache: None,
        }
    }

    pub fn with_auth_cache(mut self, cache: AuthCache) -> Self {
        self.auth_cache = Some(cache);
        self
    }

    pub fn credentials(&self) -> Option<&ScopedCredentials> {
        self.credentials.as_ref()
    }

    pub fn auth_cache(&self) -> Option<&AuthCache> {
        self.auth_cache.as_ref()
    }

    /// Whether this context carries nothing to authenticate with.
    pub fn is_anonymous(&self) -> bool {
        self.credentials.is_none()
    }

    /// Credentials whose scope covers the host and port of `url`.
    pub fn credentials_for(&self, url: &Url) -> Option<&ScopedCredentials> {
        let scope = AuthScope::for_url(url)?;
        self.credentials.as_ref().filter(|c| c.scope == scope)
    }

    /// Header to send on the first request, if the cache holds a Basic
    /// entry for the target and credentials cover it.
    pub fn preemptive_authorization(&self, url: &Url) -> Option<String> {
        let target = AuthTarget::for_url(url)?;
        match self.auth_cache.as_ref()?.get(&target)? {
            AuthScheme::Basic => self.credentials_for(url).map(ScopedCredentials::basic_header),
        }
    }

    /// Header answering a `WWW-Authenticate` challenge from `url`.
    ///
    /// Only the Basic scheme is supported.
    pub fn challenge_authorization(&self, url: &Url, challenge: &str) -> Option<String> {
        let scheme = challenge.split_whitespace().next()?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        self.credentials_for(url).map(ScopedCredentials::basic_header)
    }
}
