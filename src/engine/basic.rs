//! Minimal built-in engine: `initialize`, `ping`, and nothing else.

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::ProcessingEngine;
use crate::error::ConnectionError;
use crate::protocol::{ErrorObject, Message, Request, Response, INITIALIZE_METHOD};
use crate::session::Connection;

pub const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Clone)]
pub struct BasicEngine {
    name: String,
    version: String,
}

impl BasicEngine {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Reply for one request.
    pub fn handle(&self, request: &Request) -> Response {
        match request.method.as_str() {
            INITIALIZE_METHOD => Response::success(request.id.clone(), self.initialize_result(request.params.as_ref())),
            "ping" => Response::success(request.id.clone(), json!({})),
            other => Response::error(Some(request.id.clone()), ErrorObject::method_not_found(other)),
        }
    }

    fn initialize_result(&self, params: Option<&Value>) -> Value {
        // Echo the client's revision when it sent one.
        let version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {},
            "serverInfo": { "name": self.name, "version": self.version },
        })
    }

    async fn run(self, connection: Arc<Connection>, scope: CancellationToken) {
        let session_id = connection.session_id().clone();
        loop {
            let message = match connection.read(&scope).await {
                Ok(message) => message,
                Err(ConnectionError::Cancelled) => {
                    tracing::debug!(session_id = %session_id, "Engine scope cancelled");
                    break;
                }
                Err(_) => break,
            };

            let Message::Request(request) = message else {
                tracing::trace!(session_id = %session_id, "Ignoring non-request message");
                continue;
            };

            let reply = self.handle(&request);
            if let Err(e) = connection.write(reply.into()).await {
                tracing::debug!(session_id = %session_id, request_id = %request.id, error = %e, "Reply not delivered");
                if e == ConnectionError::Closed {
                    break;
                }
            }
        }
        tracing::debug!(session_id = %session_id, "Engine stopped");
    }
}

impl Default for BasicEngine {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

impl ProcessingEngine for BasicEngine {
    fn serve(&self, connection: Arc<Connection>, scope: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(self.clone().run(connection, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Notification, RequestId};
    use crate::session::SessionId;

    #[test]
    fn unknown_methods_are_not_found() {
        let engine = BasicEngine::default();
        let reply = engine.handle(&Request::new(3, "tools/list", None));
        assert_eq!(reply.id, Some(RequestId::Number(3)));
        assert_eq!(reply.error.map(|e| e.code), Some(-32601));
    }

    #[test]
    fn initialize_reports_server_info() {
        let engine = BasicEngine::new("bridge", "1.2.3");
        let reply = engine.handle(&Request::new(1, INITIALIZE_METHOD, Some(json!({"protocolVersion": "2025-03-26"}))));
        let result = reply.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "bridge");
    }

    #[tokio::test]
    async fn serves_until_closed() {
        let connection = Arc::new(Connection::new(SessionId::generate(), 8, 8));
        let scope = CancellationToken::new();
        let worker = tokio::spawn(BasicEngine::default().serve(connection.clone(), scope.clone()));

        let pending = connection.register_pending(RequestId::from(7)).unwrap();
        connection
            .enqueue_inbound(Notification::new("notifications/initialized", None).into(), &scope)
            .await
            .unwrap();
        connection
            .enqueue_inbound(Request::new(7, "ping", None).into(), &scope)
            .await
            .unwrap();
        let reply = pending.recv().await.unwrap();
        assert_eq!(reply.id(), Some(&RequestId::Number(7)));
        drop(pending);

        connection.close();
        worker.await.unwrap();
    }
}
