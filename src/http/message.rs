//! POST and DELETE handlers for `/mcp`.
//!
//! # Responsibilities
//! - Decode one JSON-RPC message per request
//! - Resolve the session, creating one only for `initialize`
//! - Start the session's processing worker exactly once
//! - Calls: wait for the correlated reply; everything else: 204

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::{ConnectionError, SessionError, TransportError};
use crate::http::request::{request_id, session_id};
use crate::http::response::{json_body, with_session_cookie, with_session_header};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::protocol::Message;
use crate::session::Session;

/// `POST /mcp`: JSON-RPC ingress.
pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = request_id(&headers);

    let message = match Message::decode(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Malformed message");
            return TransportError::from(e).into_response();
        }
    };

    let (session, created) = match resolve_session(&state, &headers, &message) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::debug!(request_id = %request_id, method = ?message.method(), error = %e, "Session not resolved");
            return TransportError::from(e).into_response();
        }
    };
    session.touch();
    ensure_worker(&state, &session).await;

    let method = message.method().map(str::to_string);
    let response = match dispatch(&state, &session, message).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                session_id = %session.id(),
                method = ?method,
                error = %e,
                "Message not answered"
            );
            e.into_response()
        }
    };

    let response = with_session_header(response, session.id());
    if created {
        with_session_cookie(response, session.id(), state.tls)
    } else {
        response
    }
}

/// `DELETE /mcp`: explicit session termination.
pub async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, TransportError> {
    let id = session_id(&headers).ok_or(SessionError::Missing)?;
    state.registry.remove(&id).ok_or(SessionError::Unknown)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Existing session, or a new one when the message is `initialize`.
fn resolve_session(
    state: &AppState,
    headers: &HeaderMap,
    message: &Message,
) -> Result<(Arc<Session>, bool), SessionError> {
    let existing = match session_id(headers) {
        Some(id) => match state.registry.lookup(&id) {
            Some(session) => return Ok((session, false)),
            None => SessionError::Unknown,
        },
        None => SessionError::Missing,
    };

    if message.is_initialize() {
        Ok((state.registry.create(), true))
    } else {
        Err(existing)
    }
}

/// Start the engine for this session if nobody has, then give it a moment to attach.
///
/// Readiness is best effort: a message enqueued before the first read
/// simply waits in the inbound queue.
async fn ensure_worker(state: &AppState, session: &Session) {
    let connection = session.connection();
    if state.registry.try_start_worker(session) {
        let worker = state
            .engine
            .serve(connection.clone(), state.engine_scope.child_token());
        let session_id = session.id().clone();
        tokio::spawn(async move {
            worker.await;
            tracing::debug!(session_id = %session_id, "Processing worker exited");
        });
    }

    if !connection.is_ready() && !connection.wait_ready(state.timeouts.ready_wait()).await {
        tracing::debug!(session_id = %session.id(), "Engine not ready yet, enqueueing anyway");
    }
}

async fn dispatch(
    state: &AppState,
    session: &Session,
    message: Message,
) -> Result<Response, TransportError> {
    let connection = session.connection();

    let Message::Request(request) = &message else {
        // Notifications and client responses need no reply.
        connection.enqueue_inbound(message, &state.engine_scope).await?;
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let pending = connection.register_pending(request.id.clone())?;
    // A full inbound queue counts against the same reply window.
    let exchange = async {
        connection.enqueue_inbound(message, &state.engine_scope).await?;
        pending.recv().await
    };

    let reply = tokio::select! {
        waited = tokio::time::timeout(state.timeouts.reply(), exchange) => match waited {
            Ok(reply) => reply?,
            Err(_) => {
                metrics::record_reply_timeout();
                return Err(TransportError::Timeout("reply"));
            }
        },
        _ = state.engine_scope.cancelled() => return Err(ConnectionError::Cancelled.into()),
    };
    drop(pending);

    Ok(json_body(reply.encode()?))
}
