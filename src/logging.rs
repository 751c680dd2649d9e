/// Structured logging setup using tracing
///
/// Writes to stderr only: stdout carries the JSON documents printed by the CLI.
/// Format follows config.log_format; "auto" picks human-readable output with ANSI
/// colors when stderr is a terminal and structured JSON when piped/redirected.

use std::io::IsTerminal;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn resolve_format(requested: &str, stderr_is_terminal: bool) -> LogFormat {
    match requested.to_ascii_lowercase().as_str() {
        "json" => LogFormat::Json,
        "pretty" => LogFormat::Pretty,
        _ if stderr_is_terminal => LogFormat::Pretty,
        _ => LogFormat::Json,
    }
}

/// Initialize tracing subscriber with stderr-only output
///
/// Log level from config.log_level (default: info)
/// RUST_LOG env var can override at runtime
pub fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match resolve_format(&config.log_format, std::io::stderr().is_terminal()) {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(true)
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .json()
                )
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_format_follows_terminal() {
        assert_eq!(resolve_format("auto", true), LogFormat::Pretty);
        assert_eq!(resolve_format("auto", false), LogFormat::Json);
    }

    #[test]
    fn test_explicit_format_wins() {
        assert_eq!(resolve_format("JSON", true), LogFormat::Json);
        assert_eq!(resolve_format("pretty", false), LogFormat::Pretty);
    }
}
