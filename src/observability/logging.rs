//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies, with
//! `tower_http` held at info.

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directives(log_level: &str) -> String {
    format!("{},tower_http=info", log_level)
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(true))
        .with(filter)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_http_layer() {
        assert_eq!(default_directives("debug"), "debug,tower_http=info");
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
