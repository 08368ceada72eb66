//! Unauthenticated endpoints: liveness and OAuth protected-resource metadata.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::request::base_url;
use crate::http::server::AppState;

/// `GET /mcp/health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
    }))
}

/// `GET /.well-known/oauth-protected-resource`, served only when an issuer is configured.
pub async fn protected_resource(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(issuer) = state.authorizer.oauth_issuer() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let resource = base_url(state.public_url.as_deref(), state.tls, &headers);
    Json(json!({
        "resource": resource,
        "authorization_servers": [issuer],
        "bearer_methods_supported": ["header"],
    }))
    .into_response()
}
