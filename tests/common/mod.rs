//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{extract::State, http::HeaderMap, routing::post, Form, Json, Router};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mcp_http_bridge::config::BridgeConfig;
use mcp_http_bridge::protocol::{Message, Notification, Request, Response as RpcResponse};
use mcp_http_bridge::session::{Connection, SessionRegistry};
use mcp_http_bridge::{ProcessingEngine, TransportServer};

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Engine answering each request on its own task, so replies may complete out of order.
///
/// - `never`: no reply
/// - `slow`: reply after `params.delay_ms`
/// - `emit`: write `params.count` notifications, then reply
/// - anything else: reply immediately
///
/// Every reply echoes `{method, id, params}`.
pub struct TestEngine;

impl ProcessingEngine for TestEngine {
    fn serve(&self, connection: Arc<Connection>, scope: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            while let Ok(message) = connection.read(&scope).await {
                let Message::Request(request) = message else {
                    continue;
                };
                let connection = connection.clone();
                tokio::spawn(async move { respond(&connection, request).await });
            }
        })
    }
}

async fn respond(connection: &Connection, request: Request) {
    let params = request.params.clone().unwrap_or(Value::Null);
    match request.method.as_str() {
        "never" => return,
        "slow" => {
            let delay = params["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        "emit" => {
            let count = params["count"].as_u64().unwrap_or(1);
            for n in 0..count {
                let event = Notification::new("test/event", Some(json!({ "n": n })));
                if connection.write(event.into()).await.is_err() {
                    return;
                }
            }
        }
        _ => {}
    }
    let reply = RpcResponse::success(
        request.id.clone(),
        json!({ "method": request.method, "id": request.id, "params": params }),
    );
    let _ = connection.write(reply.into()).await;
}

/// Defaults suitable for tests: ephemeral port, short timeouts.
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.reply_secs = 5;
    config.timeouts.shutdown_secs = 6;
    config.timeouts.request_secs = 7;
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<SessionRegistry>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(10), self.task).await;
    }
}

pub async fn spawn_server(config: BridgeConfig) -> TestServer {
    spawn(TransportServer::new(config, Arc::new(TestEngine))).await
}

pub async fn spawn(server: TransportServer) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = server.registry();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.run(listener, shutdown.clone()));
    TestServer {
        addr,
        registry,
        shutdown,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap()
}

pub async fn post_json(
    client: &reqwest::Client,
    server: &TestServer,
    session: Option<&str>,
    body: Value,
) -> reqwest::Response {
    let mut request = client.post(server.url("/mcp")).json(&body);
    if let Some(session) = session {
        request = request.header(SESSION_HEADER, session);
    }
    request.send().await.unwrap()
}

/// Run `initialize` and return the new session id.
pub async fn initialize(client: &reqwest::Client, server: &TestServer) -> String {
    let response = post_json(
        client,
        server,
        None,
        json!({"jsonrpc": "2.0", "id": 0, "method": "initialize"}),
    )
    .await;
    assert_eq!(response.status(), 200);
    response.headers()[SESSION_HEADER]
        .to_str()
        .unwrap()
        .to_string()
}

/// OAuth authorization server stub counting introspection calls.
pub struct MockIssuer {
    pub url: String,
    calls: Arc<AtomicUsize>,
}

impl MockIssuer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct IssuerState {
    calls: Arc<AtomicUsize>,
    active_token: &'static str,
    secret: &'static str,
}

#[derive(Deserialize)]
struct IntrospectForm {
    token: String,
}

async fn introspect(
    State(state): State<IssuerState>,
    headers: HeaderMap,
    Form(form): Form<IntrospectForm>,
) -> Result<Json<Value>, axum::http::StatusCode> {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let secret = headers.get("x-resource-secret").and_then(|v| v.to_str().ok());
    if secret != Some(state.secret) {
        return Err(axum::http::StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({ "active": form.token == state.active_token })))
}

/// Start an issuer accepting `active_token` when called with `secret`.
pub async fn spawn_issuer(active_token: &'static str, secret: &'static str) -> MockIssuer {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/introspect", post(introspect))
        .with_state(IssuerState {
            calls: calls.clone(),
            active_token,
            secret,
        });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    MockIssuer {
        url: format!("http://{}", addr),
        calls,
    }
}
