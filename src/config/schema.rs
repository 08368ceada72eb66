//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the MCP HTTP bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Session lifetime and queue sizing.
    pub session: SessionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Bearer token / OAuth settings.
    pub auth: AuthConfig,

    /// Host allow-list and request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8081").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Externally visible base URL, used in discovery documents and
    /// `WWW-Authenticate` challenges. Derived from the Host header when unset.
    pub public_url: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8081".to_string(),
            tls: None,
            public_url: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is reaped.
    pub ttl_secs: u64,

    /// Interval between reaper sweeps.
    pub reap_interval_secs: u64,

    /// Capacity of each session's inbound queue.
    pub inbound_capacity: usize,

    /// Capacity of each session's outbound notification queue.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            reap_interval_secs: 300,
            inbound_capacity: 64,
            outbound_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a call waits for its correlated reply.
    pub reply_secs: u64,

    /// How long a request waits for a freshly started engine to attach.
    pub ready_wait_ms: u64,

    /// Event-stream heartbeat interval (refreshes session activity).
    pub heartbeat_secs: u64,

    /// Graceful shutdown drain window. Must exceed `reply_secs`.
    pub shutdown_secs: u64,

    /// Outer backstop for producing any response. Must exceed `reply_secs`.
    pub request_secs: u64,

    /// Timeout for a single OAuth introspection call.
    pub introspection_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            reply_secs: 30,
            ready_wait_ms: 100,
            heartbeat_secs: 30,
            shutdown_secs: 35,
            request_secs: 45,
            introspection_secs: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn reply(&self) -> Duration {
        Duration::from_secs(self.reply_secs)
    }

    pub fn ready_wait(&self) -> Duration {
        Duration::from_millis(self.ready_wait_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn introspection(&self) -> Duration {
        Duration::from_secs(self.introspection_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per client IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Authorization configuration.
///
/// With neither `static_token` nor `oauth_issuer` set, every request is
/// accepted (trusted local mode).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Static bearer token accepted without introspection.
    pub static_token: Option<String>,

    /// OAuth authorization server base URL; tokens are checked at `{issuer}/introspect`.
    pub oauth_issuer: Option<String>,

    /// Pre-shared secret presented to the introspection endpoint.
    pub oauth_resource_secret: Option<String>,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hostnames accepted in Host/Origin besides loopback.
    pub allowed_hosts: Vec<String>,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            max_body_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
