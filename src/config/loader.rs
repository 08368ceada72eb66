//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::BridgeConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_ALLOWED_HOSTS: &str = "MCP_ALLOWED_HOSTS";
pub const ENV_AUTH_TOKEN: &str = "MCP_AUTH_TOKEN";
pub const ENV_OAUTH_ISSUER: &str = "MCP_OAUTH_ISSUER";
pub const ENV_OAUTH_RESOURCE_SECRET: &str = "MCP_OAUTH_RESOURCE_SECRET";
pub const ENV_BIND_ADDRESS: &str = "MCP_BIND_ADDRESS";
pub const ENV_PUBLIC_URL: &str = "MCP_PUBLIC_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a configuration: TOML file (optional), then process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => BridgeConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse TOML without validating.
pub fn parse_config(content: &str) -> Result<BridgeConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Overlay environment variables onto `config`. Blank values count as unset.
pub fn apply_env_overrides<F>(config: &mut BridgeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(hosts) = get(ENV_ALLOWED_HOSTS) {
        config.security.allowed_hosts = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(token) = get(ENV_AUTH_TOKEN) {
        config.auth.static_token = Some(token);
    }
    if let Some(issuer) = get(ENV_OAUTH_ISSUER) {
        config.auth.oauth_issuer = Some(issuer);
    }
    if let Some(secret) = get(ENV_OAUTH_RESOURCE_SECRET) {
        config.auth.oauth_resource_secret = Some(secret);
    }
    if let Some(bind) = get(ENV_BIND_ADDRESS) {
        config.listener.bind_address = bind;
    }
    if let Some(url) = get(ENV_PUBLIC_URL) {
        config.listener.public_url = Some(url);
    }
}
