//! Host/Origin validation (DNS-rebinding defense).
//!
//! A browser tricked into resolving an attacker's name to 127.0.0.1 still
//! sends the attacker's name in `Host` and `Origin`. Only loopback names and
//! explicitly configured hostnames pass.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::error::TransportError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostGuardError {
    #[error("missing Host header")]
    MissingHost,

    #[error("host {0:?} is not allowed")]
    Host(String),

    #[error("origin {0:?} is not allowed")]
    Origin(String),
}

/// Allow-list of hostnames. Loopback is always allowed.
#[derive(Debug, Clone, Default)]
pub struct HostGuard {
    allowed: Vec<String>,
}

impl HostGuard {
    /// Entries may carry a port (`example.com:8443`); only the hostname is compared.
    pub fn new(allowed_hosts: &[String]) -> Self {
        let allowed = allowed_hosts
            .iter()
            .map(|h| hostname_of(h.trim()).to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { allowed }
    }

    /// Validate a request's Host (or `:authority`) and optional Origin.
    pub fn check(&self, host: Option<&str>, origin: Option<&str>) -> Result<(), HostGuardError> {
        let host = host
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(HostGuardError::MissingHost)?;
        if !self.is_allowed(hostname_of(host)) {
            return Err(HostGuardError::Host(host.to_string()));
        }

        if let Some(origin) = origin {
            let origin_host = Url::parse(origin)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string));
            match origin_host {
                Some(h) if self.is_allowed(&h) => {}
                _ => return Err(HostGuardError::Origin(origin.to_string())),
            }
        }
        Ok(())
    }

    /// Check straight from request headers, falling back to the URI authority.
    pub fn check_headers(
        &self,
        headers: &HeaderMap,
        authority: Option<&str>,
    ) -> Result<(), HostGuardError> {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or(authority);
        let origin = match headers.get(header::ORIGIN) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| HostGuardError::Origin("<non-ascii>".to_string()))?,
            ),
            None => None,
        };
        self.check(host, origin)
    }

    fn is_allowed(&self, hostname: &str) -> bool {
        let hostname = hostname.trim_start_matches('[').trim_end_matches(']');
        is_loopback(hostname) || self.allowed.iter().any(|a| a.eq_ignore_ascii_case(hostname))
    }
}

/// Strip an optional port from an authority, keeping IPv6 brackets.
fn hostname_of(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => authority,
    }
}

fn is_loopback(hostname: &str) -> bool {
    hostname.eq_ignore_ascii_case("localhost")
        || hostname
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Middleware rejecting requests whose Host/Origin fail the guard.
pub async fn host_guard_middleware(
    State(guard): State<Arc<HostGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authority = request.uri().authority().map(|a| a.as_str().to_string());
    match guard.check_headers(request.headers(), authority.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(error = %e, path = %request.uri().path(), "Host/Origin rejected");
            TransportError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_passes_without_configuration() {
        let guard = HostGuard::default();
        for host in ["localhost:8081", "127.0.0.1:8081", "[::1]:8081", "LOCALHOST", "127.0.0.2"] {
            assert_eq!(guard.check(Some(host), None), Ok(()), "{}", host);
        }
        assert_eq!(guard.check(Some("localhost:8081"), Some("http://localhost:3000")), Ok(()));
        assert_eq!(guard.check(Some("localhost:8081"), Some("http://[::1]:3000")), Ok(()));
    }

    #[test]
    fn foreign_origin_rejected() {
        let guard = HostGuard::default();
        assert_eq!(
            guard.check(Some("localhost:8081"), Some("http://evil.example")),
            Err(HostGuardError::Origin("http://evil.example".into()))
        );
        assert!(guard.check(Some("localhost"), Some("null")).is_err());
    }

    #[test]
    fn foreign_host_rejected_unless_configured() {
        let open = HostGuard::default();
        assert!(matches!(open.check(Some("mcp.example.com"), None), Err(HostGuardError::Host(_))));

        let guard = HostGuard::new(&["MCP.example.com:443".to_string()]);
        assert_eq!(guard.check(Some("mcp.example.com"), Some("https://mcp.example.com")), Ok(()));
        assert!(guard.check(Some("other.example.com"), None).is_err());
    }

    #[test]
    fn missing_host_rejected() {
        assert_eq!(HostGuard::default().check(None, None), Err(HostGuardError::MissingHost));
    }

    #[test]
    fn hostname_strips_port() {
        assert_eq!(hostname_of("example.com:80"), "example.com");
        assert_eq!(hostname_of("[::1]:80"), "[::1]");
        assert_eq!(hostname_of("example.com"), "example.com");
    }
}
