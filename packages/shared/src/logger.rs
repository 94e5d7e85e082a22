//! Logging setup utilities for the relay server and client binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are enabled by the default filter.
const WORKSPACE_CRATES: [&str; 3] = [
    "tcp_session_shared",
    "tcp_session_server",
    "tcp_session_client",
];

/// Build the default `EnvFilter` directive string used when `RUST_LOG` is unset.
///
/// Every workspace crate and the binary itself log at `default_log_level`;
/// everything else (tokio, mio, ...) stays at the subscriber default.
pub fn default_directives(binary_name: &str, default_log_level: &str) -> String {
    let mut directives: Vec<String> = WORKSPACE_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, default_log_level))
        .collect();

    let binary_target = binary_name.replace('-', "_");
    if !WORKSPACE_CRATES.contains(&binary_target.as_str()) {
        directives.push(format!("{}={}", binary_target, default_log_level));
    }

    directives.join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
/// Events go to stderr; the client uses stdout for relayed data.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "tcp-session-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use tcp_session_shared::logger::setup_logger;
///
/// setup_logger("tcp-session-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
