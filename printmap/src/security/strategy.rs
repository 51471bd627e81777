//! Security strategies selectable per target host.

use super::context::{AuthCache, AuthScheme, AuthScope, AuthTarget, RequestContext, ScopedCredentials};
use super::error::SecurityError;
use super::matcher::HostMatcher;
use std::fmt;
use tracing::debug;
use url::Url;

/// HTTP Basic authentication settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BasicAuthSecurity {
    username: Option<String>,
    password: Option<String>,
    preemptive: bool,
}

impl BasicAuthSecurity {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            preemptive: false,
        }
    }

    /// Settings as read from configuration, where either value may be missing.
    pub fn from_parts(username: Option<String>, password: Option<String>, preemptive: bool) -> Self {
        Self {
            username,
            password,
            preemptive,
        }
    }

    /// Send credentials on the first request instead of after a challenge.
    pub fn with_preemptive(mut self, preemptive: bool) -> Self {
        self.preemptive = preemptive;
        self
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_preemptive(&self) -> bool {
        self.preemptive
    }

    /// Both username and password are required.
    pub fn validate(&self) -> Result<(), SecurityError> {
        match (&self.username, &self.password) {
            (Some(_), Some(_)) => Ok(()),
            _ => Err(SecurityError::MissingCredentials),
        }
    }

    fn create_context(&self, url: &Url) -> Result<RequestContext, SecurityError> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(SecurityError::MissingCredentials);
        };
        let scope =
            AuthScope::for_url(url).ok_or_else(|| SecurityError::NoHost(url.to_string()))?;

        let context = RequestContext::with_credentials(ScopedCredentials {
            scope,
            username: username.clone(),
            password: password.clone(),
        });

        if !self.preemptive {
            return Ok(context);
        }

        let target =
            AuthTarget::for_url(url).ok_or_else(|| SecurityError::NoHost(url.to_string()))?;
        let mut cache = AuthCache::new();
        cache.put(target, AuthScheme::Basic);
        Ok(context.with_auth_cache(cache))
    }
}

impl fmt::Debug for BasicAuthSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthSecurity")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("preemptive", &self.preemptive)
            .finish()
    }
}

/// The authentication methods a strategy can apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    /// Requests go out without credentials
    NoAuth,
    /// HTTP Basic authentication
    BasicAuth(BasicAuthSecurity),
}

impl StrategyKind {
    /// Name used for the `type` configuration key.
    pub fn type_name(&self) -> &'static str {
        match self {
            StrategyKind::NoAuth => "noAuth",
            StrategyKind::BasicAuth(_) => "basicAuth",
        }
    }
}

/// An authentication method plus the hosts it applies to.
///
/// Stateless after construction: every call to
/// [`create_context`](Self::create_context) builds a new context.
#[derive(Debug, Clone)]
pub struct SecurityStrategy {
    matcher: Option<HostMatcher>,
    kind: StrategyKind,
}

impl SecurityStrategy {
    pub fn no_auth() -> Self {
        Self {
            matcher: None,
            kind: StrategyKind::NoAuth,
        }
    }

    /// Basic auth strategy; fails when username or password is missing.
    pub fn basic_auth(settings: BasicAuthSecurity) -> Result<Self, SecurityError> {
        settings.validate()?;
        Ok(Self {
            matcher: None,
            kind: StrategyKind::BasicAuth(settings),
        })
    }

    /// Limits the strategy to URLs accepted by `matcher`.
    pub fn with_matcher(mut self, matcher: HostMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn matcher(&self) -> Option<&HostMatcher> {
        self.matcher.as_ref()
    }

    pub fn kind(&self) -> &StrategyKind {
        &self.kind
    }

    /// Whether this strategy applies to `url`.
    ///
    /// No matcher means every URL. A matcher that fails to evaluate is a
    /// non-match.
    pub async fn matches(&self, url: &Url) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };
        match matcher.validate(url).await {
            Ok(matched) => matched,
            Err(e) => {
                debug!(url = %url, error = %e, "Host matcher failed, skipping strategy");
                false
            }
        }
    }

    /// Builds the request context for one request to `url`.
    pub fn create_context(&self, url: &Url) -> Result<RequestContext, SecurityError> {
        match &self.kind {
            StrategyKind::NoAuth => Ok(RequestContext::none()),
            StrategyKind::BasicAuth(basic) => basic.create_context(url),
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
    fn test_basic_auth_requires_both_values() {
        let missing_password = BasicAuthSecurity::from_parts(Some("xyz".into()), None, false);
        assert_eq!(
            SecurityStrategy::basic_auth(missing_password).unwrap_err(),
            SecurityError::MissingCredentials
        );

        let missing_username = BasicAuthSecurity::from_parts(None, Some("yxz".into()), true);
        assert!(missing_username.validate().is_err());
    }

    #[test]
    fn test_context_binds_exact_host_and_port() {
        let strategy = SecurityStrategy::basic_auth(BasicAuthSecurity::new("xyz", "yxz")).unwrap();
        let context = strategy
            .create_context(&url("http://c2cpc61.camptocamp.com:8080/wms"))
            .unwrap();

        let creds = context.credentials().unwrap();
        assert_eq!(creds.scope.host, "c2cpc61.camptocamp.com");
        assert_eq!(creds.scope.port, 8080);
        assert_eq!(creds.username, "xyz");
        assert_eq!(creds.password, "yxz");
    }

    #[test]
    fn test_preemptive_seeds_auth_cache() {
        let target = url("http://c2cpc61.camptocamp.com");
        let strategy = SecurityStrategy::basic_auth(
            BasicAuthSecurity::new("xyz", "yxz").with_preemptive(true),
        )
        .unwrap();

        let context = strategy.create_context(&target).unwrap();
        let cache = context.auth_cache().expect("auth cache seeded");
        let key = AuthTarget {
            scheme: "http".to_string(),
            host: "c2cpc61.camptocamp.com".to_string(),
            port: 80,
        };
        assert_eq!(cache.get(&key), Some(AuthScheme::Basic));
    }

    #[test]
    fn test_non_preemptive_has_no_auth_cache() {
        let strategy = SecurityStrategy::basic_auth(BasicAuthSecurity::new("xyz", "yxz")).unwrap();
        let context = strategy
            .create_context(&url("http://c2cpc42.camptocamp.com"))
            .unwrap();
        assert!(context.auth_cache().is_none());
        assert!(context.credentials().is_some());
    }

    #[tokio::test]
    async fn test_no_matcher_matches_everything() {
        let strategy = SecurityStrategy::no_auth();
        assert!(strategy.matches(&url("http://a.example.com")).await);
        assert_eq!(
            strategy.create_context(&url("http://a.example.com")).unwrap(),
            RequestContext::none()
        );
    }

    #[tokio::test]
    async fn test_failing_matcher_is_non_match() {
        let strategy = SecurityStrategy::no_auth().with_matcher(HostMatcher::Address {
            ip: "10.0.0.0".parse().unwrap(),
            mask: "255.0.0.0".parse().unwrap(),
            port: None,
        });
        assert!(!strategy.matches(&url("http://host.invalid/wms")).await);
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", BasicAuthSecurity::new("xyz", "secret"));
        assert!(!debug.contains("secret"));
    }
}
