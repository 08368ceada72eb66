//! Response construction helpers.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::request::{MCP_SESSION_ID, SESSION_COOKIE};
use crate::protocol::{ErrorObject, Message, Response as RpcResponse};
use crate::session::SessionId;

const JSON: HeaderValue = HeaderValue::from_static("application/json");

/// A JSON-RPC error envelope with `id: null` and the given HTTP status.
pub fn json_rpc_error(status: StatusCode, code: i64, message: &str) -> Response {
    let envelope = Message::Response(RpcResponse::error(None, ErrorObject::new(code, message)));
    match envelope.encode() {
        Ok(body) => (status, [(header::CONTENT_TYPE, JSON)], body).into_response(),
        Err(_) => (status, message.to_string()).into_response(),
    }
}

/// A JSON body with status 200.
pub fn json_body(body: Vec<u8>) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, JSON)], body).into_response()
}

/// Echo the session id on a response.
pub fn with_session_header(mut response: Response, id: &SessionId) -> Response {
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(MCP_SESSION_ID, value);
    }
    response
}

/// Attach the session cookie issued when a session is created.
pub fn with_session_cookie(mut response: Response, id: &SessionId, secure: bool) -> Response {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", SESSION_COOKIE, id);
    if secure {
        cookie.push_str("; Secure");
    }
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}
