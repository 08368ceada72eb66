//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0)
//! - Check timeout ordering (shutdown drain outlives a reply wait)
//! - Check URLs and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::BridgeConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("timeouts.{field} ({value}s) must be greater than timeouts.reply_secs ({reply}s)")]
    NotLongerThanReply {
        field: &'static str,
        value: u64,
        reply: u64,
    },

    #[error("{field} {value:?} is not an absolute http(s) URL")]
    Url { field: &'static str, value: String },

    #[error("listener.tls requires both cert_path and key_path")]
    TlsPaths,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a loaded configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::TlsPaths);
        }
    }
    if let Some(public_url) = &config.listener.public_url {
        check_url("listener.public_url", public_url, &mut errors);
    }

    let nonzero = [
        ("session.ttl_secs", config.session.ttl_secs),
        ("session.reap_interval_secs", config.session.reap_interval_secs),
        ("session.inbound_capacity", config.session.inbound_capacity as u64),
        ("session.outbound_capacity", config.session.outbound_capacity as u64),
        ("timeouts.reply_secs", config.timeouts.reply_secs),
        ("timeouts.heartbeat_secs", config.timeouts.heartbeat_secs),
        ("timeouts.introspection_secs", config.timeouts.introspection_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_second == 0 {
            errors.push(ValidationError::Zero {
                field: "rate_limit.requests_per_second",
            });
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::Zero {
                field: "rate_limit.burst_size",
            });
        }
    }

    let reply = config.timeouts.reply_secs;
    for (field, value) in [
        ("shutdown_secs", config.timeouts.shutdown_secs),
        ("request_secs", config.timeouts.request_secs),
    ] {
        if value <= reply {
            errors.push(ValidationError::NotLongerThanReply { field, value, reply });
        }
    }

    if let Some(issuer) = &config.auth.oauth_issuer {
        check_url("auth.oauth_issuer", issuer, &mut errors);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    let valid = Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::Url {
            field,
            value: value.to_string(),
        });
    }
}
