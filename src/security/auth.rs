//! Request authorization strategies.
//!
//! The default [`HybridAuthorizer`] accepts a static bearer token (constant-time
//! compare) and otherwise asks an OAuth authorization server to introspect
//! the token.
//!
//! # Trusted local mode
//! With neither a static token nor an OAuth issuer configured, EVERY request
//! is accepted. This is intended for loopback-only deployments where the
//! Host/Origin guard is the only boundary, and is announced with a warning
//! at startup.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;

/// Header carrying the pre-shared resource secret to the introspection endpoint.
pub const RESOURCE_SECRET_HEADER: &str = "x-resource-secret";

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    /// Caller is not authenticated (401).
    Deny(&'static str),
    /// The transport itself is misconfigured (500).
    Misconfigured(&'static str),
}

/// Pluggable authorization strategy.
pub trait Authorizer: Send + Sync {
    /// Decide on a request given its bearer token, if any.
    fn authorize<'a>(&'a self, bearer: Option<&'a str>) -> BoxFuture<'a, AuthDecision>;

    /// Issuer to advertise in protected-resource metadata.
    fn oauth_issuer(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
}

/// Client for `POST {issuer}/introspect`.
#[derive(Debug, Clone)]
pub struct Introspector {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
}

impl Introspector {
    pub fn new(issuer: &str, secret: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default introspection client");
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint: format!("{}/introspect", issuer.trim_end_matches('/')),
            secret,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// True only for a 200 response whose body says `"active": true`.
    pub async fn is_active(&self, token: &str) -> Result<bool, reqwest::Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(RESOURCE_SECRET_HEADER, &self.secret)
            .form(&[("token", token)])
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!(status = %response.status(), "Introspection rejected token");
            return Ok(false);
        }
        let body: IntrospectionResponse = response.json().await?;
        Ok(body.active)
    }
}

/// Static token first, OAuth introspection second.
pub struct HybridAuthorizer {
    static_token: Option<String>,
    issuer: Option<String>,
    introspector: Option<Introspector>,
}

impl HybridAuthorizer {
    pub fn from_config(config: &AuthConfig, introspection_timeout: Duration) -> Self {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();
        let static_token = non_empty(&config.static_token);
        let issuer = non_empty(&config.oauth_issuer);
        let secret = non_empty(&config.oauth_resource_secret);

        let introspector = match (&issuer, secret) {
            (Some(issuer), Some(secret)) => {
                Some(Introspector::new(issuer, secret, introspection_timeout))
            }
            (Some(issuer), None) => {
                tracing::error!(
                    issuer = %issuer,
                    "OAuth issuer configured without a resource secret; token checks will fail with 500"
                );
                None
            }
            _ => None,
        };

        if static_token.is_none() && issuer.is_none() {
            tracing::warn!(
                "No static token or OAuth issuer configured: accepting ALL requests (trusted local mode)"
            );
        }

        Self {
            static_token,
            issuer,
            introspector,
        }
    }

    /// True when every request is accepted.
    pub fn is_open(&self) -> bool {
        self.static_token.is_none() && self.issuer.is_none()
    }

    fn matches_static(&self, token: &str) -> bool {
        match &self.static_token {
            Some(expected) => bool::from(expected.as_bytes().ct_eq(token.as_bytes())),
            None => false,
        }
    }

    async fn decide(&self, bearer: Option<&str>) -> AuthDecision {
        if self.is_open() {
            return AuthDecision::Allow;
        }
        let Some(token) = bearer.filter(|t| !t.is_empty()) else {
            return AuthDecision::Deny("missing bearer token");
        };
        if self.matches_static(token) {
            return AuthDecision::Allow;
        }
        if self.issuer.is_none() {
            return AuthDecision::Deny("invalid bearer token");
        }
        let Some(introspector) = &self.introspector else {
            return AuthDecision::Misconfigured("OAuth resource secret is not configured");
        };
        match introspector.is_active(token).await {
            Ok(true) => AuthDecision::Allow,
            Ok(false) => AuthDecision::Deny("inactive bearer token"),
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %introspector.endpoint(), "Token introspection failed");
                AuthDecision::Deny("token introspection failed")
            }
        }
    }
}

impl Authorizer for HybridAuthorizer {
    fn authorize<'a>(&'a self, bearer: Option<&'a str>) -> BoxFuture<'a, AuthDecision> {
        Box::pin(self.decide(bearer))
    }

    fn oauth_issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer(token: Option<&str>, issuer: Option<&str>, secret: Option<&str>) -> HybridAuthorizer {
        HybridAuthorizer::from_config(
            &AuthConfig {
                static_token: token.map(str::to_string),
                oauth_issuer: issuer.map(str::to_string),
                oauth_resource_secret: secret.map(str::to_string),
            },
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn open_mode_accepts_everything() {
        let auth = authorizer(None, None, None);
        assert!(auth.is_open());
        assert_eq!(auth.authorize(None).await, AuthDecision::Allow);
        assert_eq!(auth.authorize(Some("anything")).await, AuthDecision::Allow);
    }

    #[tokio::test]
    async fn static_token_must_match() {
        let auth = authorizer(Some("s3cret"), None, None);
        assert_eq!(auth.authorize(Some("s3cret")).await, AuthDecision::Allow);
        assert_eq!(
            auth.authorize(Some("s3cre")).await,
            AuthDecision::Deny("invalid bearer token")
        );
        assert_eq!(
            auth.authorize(None).await,
            AuthDecision::Deny("missing bearer token")
        );
    }

    #[tokio::test]
    async fn issuer_without_secret_is_misconfigured() {
        let auth = authorizer(None, Some("http://127.0.0.1:9"), None);
        assert!(matches!(
            auth.authorize(Some("token")).await,
            AuthDecision::Misconfigured(_)
        ));
        // Missing credentials are still a plain 401.
        assert!(matches!(auth.authorize(None).await, AuthDecision::Deny(_)));
    }

    #[test]
    fn introspection_endpoint_joins_issuer() {
        let introspector = Introspector::new("https://auth.example.com/", "x".into(), Duration::from_secs(1));
        assert_eq!(introspector.endpoint(), "https://auth.example.com/introspect");
    }
}
