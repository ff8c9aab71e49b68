//! Logging infrastructure for ElectroGPT.
//!
//! Initializes the tracing subscriber for structured logging. All logs go to
//! stderr so stdout stays clean for answers.

use std::io::IsTerminal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Initialize the tracing subscriber with stderr output.
///
/// This sets up structured logging with:
/// - Output to stderr (stdout is reserved for answers)
/// - Environment-based filtering (RUST_LOG or provided level)
/// - Optional ANSI color control
///
/// # Arguments
/// * `log_level` - Optional log level override (e.g., "debug", "info")
/// * `no_color` - Disable colored output
///
/// # Example
/// ```no_run
/// use electro_core::logging::init_logging;
///
/// init_logging(None, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let env_filter = build_filter(log_level)?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Build the log filter; defaults to `warn` globally and `info` for our crates.
fn build_filter(log_level: Option<&str>) -> AppResult<EnvFilter> {
    let filter_str = match log_level {
        Some(level) => level.to_string(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "warn,electrogpt=info,electro_knowledge=info,electro_llm=info".to_string()
        }),
    };

    EnvFilter::try_new(&filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter {:?}: {}", filter_str, e)))
}

/// Check if stderr is a terminal that should get colors.
fn supports_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_level() {
        assert!(build_filter(Some("debug")).is_ok());
        assert!(build_filter(Some("electro_knowledge=trace,warn")).is_ok());
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        assert!(build_filter(Some("[[[")).is_err());
    }
}
