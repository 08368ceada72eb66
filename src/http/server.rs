//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit, host guard, admission)
//! - Bind to the listener, plain or TLS
//! - Own the session reaper and the processing-engine scope
//! - Graceful shutdown: stop accepting, drain, cancel engines, close sessions

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tokio_util::sync::CancellationToken;

use crate::config::{BridgeConfig, TimeoutConfig};
use crate::engine::ProcessingEngine;
use crate::http::request::MakeRequestUuid;
use crate::http::{discovery, message, stream};
use crate::observability::metrics;
use crate::security::admission::RESOURCE_METADATA_PATH;
use crate::security::{
    admission_middleware, host_guard_middleware, rate_limit, Admission, Authorizer, HostGuard,
    HybridAuthorizer,
};
use crate::session::SessionRegistry;

pub const MCP_PATH: &str = "/mcp";
pub const SSE_PATH: &str = "/mcp/sse";
pub const HEALTH_PATH: &str = "/mcp/health";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub engine: Arc<dyn ProcessingEngine>,
    /// Parent of every processing worker's scope; cancelled after the drain.
    pub engine_scope: CancellationToken,
    /// Cancelled when the server stops accepting; ends event streams.
    pub shutdown: CancellationToken,
    pub authorizer: Arc<dyn Authorizer>,
    pub timeouts: TimeoutConfig,
    pub public_url: Option<String>,
    pub tls: bool,
}

/// The MCP HTTP transport.
pub struct TransportServer {
    config: BridgeConfig,
    engine: Arc<dyn ProcessingEngine>,
    authorizer: Arc<dyn Authorizer>,
    registry: Arc<SessionRegistry>,
    tls: Option<RustlsConfig>,
}

impl TransportServer {
    pub fn new(config: BridgeConfig, engine: Arc<dyn ProcessingEngine>) -> Self {
        let authorizer = Arc::new(HybridAuthorizer::from_config(
            &config.auth,
            config.timeouts.introspection(),
        ));
        let registry = Arc::new(SessionRegistry::new(&config.session));
        Self {
            config,
            engine,
            authorizer,
            registry,
            tls: None,
        }
    }

    /// Replace the default hybrid authorizer.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Terminate TLS with the given rustls configuration.
    pub fn with_tls(mut self, tls: RustlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self, state: AppState) -> Router {
        let admission = Arc::new(Admission::new(
            rate_limit::from_config(&self.config.rate_limit),
            self.authorizer.clone(),
            self.config.listener.public_url.clone(),
            self.tls.is_some(),
        ));
        let guard = Arc::new(HostGuard::new(&self.config.security.allowed_hosts));

        // The request timeout is a backstop for POST/DELETE only; streams are long-lived.
        let mcp_route = post(message::post_message)
            .delete(message::delete_session)
            .layer(TimeoutLayer::new(self.config.timeouts.request()))
            .get(stream::stream_events);

        let protected = Router::new()
            .route(MCP_PATH, mcp_route)
            .route(SSE_PATH, get(stream::stream_events))
            .route_layer(middleware::from_fn_with_state(admission, admission_middleware));

        let public = Router::new()
            .route(HEALTH_PATH, get(discovery::health))
            .route(RESOURCE_METADATA_PATH, get(discovery::protected_resource));

        protected
            .merge(public)
            .with_state(state)
            .layer(middleware::from_fn_with_state(guard, host_guard_middleware))
            .layer(middleware::from_fn(track_metrics))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    // The extractor's own 2 MiB default would otherwise cap the configured size.
                    .layer(DefaultBodyLimit::max(self.config.security.max_body_size))
                    .layer(RequestBodyLimitLayer::new(self.config.security.max_body_size)),
            )
    }

    /// Serve on `listener` until `shutdown` is cancelled, then drain and tear down.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let stop = shutdown.child_token();
        let engine_scope = CancellationToken::new();

        let state = AppState {
            registry: self.registry.clone(),
            engine: self.engine.clone(),
            engine_scope: engine_scope.clone(),
            shutdown: stop.clone(),
            authorizer: self.authorizer.clone(),
            timeouts: self.config.timeouts.clone(),
            public_url: self.config.listener.public_url.clone(),
            tls: self.tls.is_some(),
        };
        let app = self
            .build_router(state)
            .into_make_service_with_connect_info::<SocketAddr>();

        let reaper = self.registry.clone().spawn_reaper(
            self.config.session.reap_interval(),
            self.config.session.ttl(),
            stop.clone(),
        );

        let drain = self.config.timeouts.shutdown();
        tracing::info!(
            address = %addr,
            tls = self.tls.is_some(),
            "MCP transport listening"
        );

        let served = match self.tls.clone() {
            Some(tls) => {
                let handle = axum_server::Handle::new();
                let trigger = handle.clone();
                let token = stop.clone();
                tokio::spawn(async move {
                    token.cancelled().await;
                    trigger.graceful_shutdown(Some(drain));
                });
                axum_server::from_tcp_rustls(listener.into_std()?, tls)
                    .handle(handle)
                    .serve(app)
                    .await
            }
            None => {
                let token = stop.clone();
                let server = axum::serve(listener, app)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .into_future();
                tokio::pin!(server);
                let finished = tokio::select! {
                    result = &mut server => Some(result),
                    _ = stop.cancelled() => None,
                };
                match finished {
                    Some(result) => result,
                    None => match tokio::time::timeout(drain, &mut server).await {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::warn!(drain_secs = drain.as_secs(), "Drain deadline passed, abandoning in-flight requests");
                            Ok(())
                        }
                    },
                }
            }
        };

        stop.cancel();
        engine_scope.cancel();
        let closed = self.registry.close_all();
        if let Err(e) = reaper.await {
            tracing::warn!(error = %e, "Session reaper task failed");
        }
        tracing::info!(closed_sessions = closed, "MCP transport stopped");
        served
    }
}

/// Record count and latency per matched route.
async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BasicEngine;
    use axum::http::StatusCode;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn router() -> Router {
        let server = TransportServer::new(BridgeConfig::default(), Arc::new(BasicEngine::default()));
        let state = AppState {
            registry: server.registry(),
            engine: server.engine.clone(),
            engine_scope: CancellationToken::new(),
            shutdown: CancellationToken::new(),
            authorizer: server.authorizer.clone(),
            timeouts: server.config.timeouts.clone(),
            public_url: None,
            tls: false,
        };
        server.build_router(state)
    }

    #[tokio::test]
    async fn host_guard_rejections_are_counted() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _local = ::metrics::set_default_local_recorder(&recorder);

        let request = Request::builder()
            .uri(HEALTH_PATH)
            .header("host", "rebind.attacker.example")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let rendered = handle.render();
        let line = rendered
            .lines()
            .find(|l| l.starts_with("mcp_http_requests_total{"))
            .unwrap_or_else(|| panic!("no request counter in:\n{rendered}"));
        assert!(line.contains(r#"status="400""#), "{line}");
        assert!(line.contains(r#"route="/mcp/health""#), "{line}");
    }
}
