//! Logging initialization for the daemon.
//!
//! All crates log through standard `tracing` macros; only the binary
//! calls `init_logging`, once, at startup.

use tracing_subscriber::EnvFilter;

/// Initialize the logging system.
///
/// Log level resolution: `RUST_LOG` wins when set, otherwise the provided
/// default (typically from config or `--log-level`).
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
