//! Request inspection helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for tracing
//! - Extract the session id (header first, then cookie)
//! - Extract the bearer token
//! - Derive the externally visible base URL

use axum::http::{header, HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::session::SessionId;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");
pub const SESSION_COOKIE: &str = "mcp_session";

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        Uuid::new_v4().to_string().parse().ok().map(RequestId::new)
    }
}

/// Request ID of the current request, if the request-id layer assigned one.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Session id from `Mcp-Session-Id`, falling back to the session cookie.
pub fn session_id(headers: &HeaderMap) -> Option<SessionId> {
    let from_header = headers
        .get(&MCP_SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    from_header
        .or_else(|| cookie(headers, SESSION_COOKIE))
        .map(SessionId::from)
}

/// Value of a named cookie from any `Cookie` header.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|v| !v.is_empty())
}

/// Token from `Authorization: Bearer <token>` (scheme is case-insensitive).
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim()).filter(|t| !t.is_empty())
    } else {
        None
    }
}

/// Configured public URL, or `scheme://host` from the request.
pub fn base_url(public_url: Option<&str>, tls: bool, headers: &HeaderMap) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = if tls { "https" } else { "http" };
    format!("{}://{}", scheme, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; mcp_session=fromcookie"));
        assert_eq!(session_id(&headers), Some(SessionId::from("fromcookie")));

        headers.insert(MCP_SESSION_ID, HeaderValue::from_static("fromheader"));
        assert_eq!(session_id(&headers), Some(SessionId::from("fromheader")));
    }

    #[test]
    fn empty_session_values_are_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(MCP_SESSION_ID, HeaderValue::from_static(" "));
        headers.insert(header::COOKIE, HeaderValue::from_static("mcp_session="));
        assert_eq!(session_id(&headers), None);
    }

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn base_url_prefers_configuration() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8081"));
        assert_eq!(base_url(None, false, &headers), "http://localhost:8081");
        assert_eq!(base_url(None, true, &headers), "https://localhost:8081");
        assert_eq!(
            base_url(Some("https://mcp.example.com/"), false, &headers),
            "https://mcp.example.com"
        );
    }
}
