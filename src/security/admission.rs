//! Admission pipeline: rate limit, then authorize.
//!
//! Runs after the Host/Origin guard and before any session or message
//! work. Rate limiting comes first so rejected clients never cost an
//! introspection round trip.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::TransportError;
use crate::http::request::{base_url, bearer_token};
use crate::observability::metrics;
use crate::security::auth::{AuthDecision, Authorizer};
use crate::security::rate_limit::RateLimiter;

pub const RESOURCE_METADATA_PATH: &str = "/.well-known/oauth-protected-resource";

/// Ordered admission checks shared by the MCP routes.
pub struct Admission {
    limiter: Box<dyn RateLimiter>,
    authorizer: Arc<dyn Authorizer>,
    public_url: Option<String>,
    tls: bool,
}

impl Admission {
    pub fn new(
        limiter: Box<dyn RateLimiter>,
        authorizer: Arc<dyn Authorizer>,
        public_url: Option<String>,
        tls: bool,
    ) -> Self {
        Self {
            limiter,
            authorizer,
            public_url,
            tls,
        }
    }

    /// Evaluate one request. `client` keys the rate limiter.
    pub async fn admit(&self, client: &str, headers: &HeaderMap) -> Result<(), TransportError> {
        if !self.limiter.check(client) {
            metrics::record_rate_limited();
            return Err(TransportError::RateLimited);
        }

        match self.authorizer.authorize(bearer_token(headers)).await {
            AuthDecision::Allow => Ok(()),
            AuthDecision::Deny(reason) => {
                metrics::record_auth_rejection(reason);
                Err(TransportError::Unauthorized {
                    reason: reason.to_string(),
                    resource_metadata: self.resource_metadata_url(headers),
                })
            }
            AuthDecision::Misconfigured(reason) => {
                metrics::record_auth_rejection("misconfigured");
                tracing::error!(reason, "Authorization misconfigured");
                Err(TransportError::AuthMisconfigured(reason.to_string()))
            }
        }
    }

    pub fn resource_metadata_url(&self, headers: &HeaderMap) -> String {
        format!(
            "{}{}",
            base_url(self.public_url.as_deref(), self.tls, headers),
            RESOURCE_METADATA_PATH
        )
    }
}

/// Middleware applying [`Admission`] to the MCP routes.
pub async fn admission_middleware(
    State(admission): State<Arc<Admission>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match admission.admit(&client, request.headers()).await {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(client = %client, error = %e, "Request not admitted");
            e.into_response()
        }
    }
}
