//! # Structured Logging
//!
//! Environment-aware tracing initialization. Console output by default,
//! JSON when `TASKBOARD_LOG_FORMAT=json` for log shippers. Call it from
//! binaries and test harnesses; initializing twice is harmless.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber once.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive()));

        let json = std::env::var("TASKBOARD_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .json()
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .try_init()
        };

        // A subscriber may already be installed by an embedding host.
        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}

/// Default log level per environment when `RUST_LOG` is unset.
fn default_directive() -> String {
    match std::env::var("TASKBOARD_ENV").as_deref() {
        Ok("production") => "info".to_string(),
        _ => "debug".to_string(),
    }
}
