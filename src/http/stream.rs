//! GET handler: server-sent event stream of a session's outbound messages.
//!
//! One `data: <json>` frame per message, in queue order. The heartbeat only
//! refreshes the session's activity timestamp; it never writes a frame.
//! The stream ends when the client goes away, the session closes, or the
//! server shuts down. Clients reconnect on their own.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{SessionError, TransportError};
use crate::http::request::{request_id, session_id};
use crate::http::response::with_session_header;
use crate::http::server::AppState;
use crate::protocol::Message;
use crate::session::Session;

/// `GET /mcp` and `GET /mcp/sse`.
pub async fn stream_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, TransportError> {
    let id = session_id(&headers).ok_or(SessionError::Missing)?;
    let session = state.registry.lookup(&id).ok_or(SessionError::Unknown)?;
    session.touch();

    tracing::info!(
        request_id = %request_id(&headers),
        session_id = %session.id(),
        "Event stream opened"
    );

    let events = event_stream(
        session.clone(),
        state.shutdown.clone(),
        state.timeouts.heartbeat(),
    );
    Ok(with_session_header(Sse::new(events).into_response(), session.id()))
}

struct StreamState {
    session: Arc<Session>,
    shutdown: CancellationToken,
    heartbeat: Interval,
}

enum Step {
    Deliver(Message),
    Heartbeat,
    End(&'static str),
}

fn event_stream(
    session: Arc<Session>,
    shutdown: CancellationToken,
    heartbeat: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut ticker = time::interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        session,
        shutdown,
        heartbeat: ticker,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let step = tokio::select! {
                biased;
                _ = state.shutdown.cancelled() => Step::End("server shutting down"),
                next = state.session.connection().next_outbound(&state.shutdown) => match next {
                    Ok(message) => Step::Deliver(message),
                    Err(_) => Step::End("session closed"),
                },
                _ = state.heartbeat.tick() => Step::Heartbeat,
            };

            match step {
                Step::Deliver(message) => {
                    state.session.touch();
                    match message.encode() {
                        Ok(bytes) => {
                            let event = Event::default().data(String::from_utf8_lossy(&bytes));
                            return Some((Ok(event), state));
                        }
                        Err(e) => {
                            tracing::warn!(session_id = %state.session.id(), error = %e, "Dropping unencodable message");
                        }
                    }
                }
                Step::Heartbeat => state.session.touch(),
                Step::End(reason) => {
                    tracing::info!(session_id = %state.session.id(), reason, "Event stream closed");
                    return None;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::protocol::Notification;
    use crate::session::SessionRegistry;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn frames_follow_queue_order_and_end_on_close() {
        let registry = SessionRegistry::new(&SessionConfig::default());
        let session = registry.create();
        let connection = session.connection().clone();

        for n in 0..3 {
            connection
                .write(Notification::new("progress", Some(serde_json::json!({ "n": n }))).into())
                .await
                .unwrap();
        }

        let events = event_stream(session.clone(), CancellationToken::new(), Duration::from_secs(30));
        tokio::pin!(events);
        for _ in 0..3 {
            assert!(events.next().await.is_some());
        }

        registry.remove(session.id());
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn heartbeat_refreshes_activity_without_frames() {
        let registry = SessionRegistry::new(&SessionConfig::default());
        let session = registry.create();
        let before = session.last_activity();

        let shutdown = CancellationToken::new();
        let events = event_stream(session.clone(), shutdown.clone(), Duration::from_millis(10));
        tokio::pin!(events);

        let stopper = shutdown.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(60)).await;
            stopper.cancel();
        });

        assert!(events.next().await.is_none());
        assert!(session.last_activity() > before);
    }
}
