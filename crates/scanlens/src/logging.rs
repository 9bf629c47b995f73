//! Logging setup for the scanlens binary.
//!
//! All log events go to stderr; stdout is reserved for the response JSON the
//! commands print. The configured level and format come in as typed config
//! values (validated at config parse time), with two CLI overrides layered on
//! top, and `RUST_LOG` trumping everything when set.

use scanlens_core::config::{LogFormat, LogLevel, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Resolve the configured settings against the CLI flags.
///
/// `--verbose` lowers the level to at most Debug (a configured Trace stays
/// Trace); `--json-logs` forces JSON output.
fn effective(config: &LoggingConfig, verbose: bool, json_logs: bool) -> (LogLevel, LogFormat) {
    let level = if verbose {
        config.level.min(LogLevel::Debug)
    } else {
        config.level
    };
    let format = if json_logs {
        LogFormat::Json
    } else {
        config.format
    };
    (level, format)
}

/// Install the global tracing subscriber.
pub fn init(config: &LoggingConfig, verbose: bool, json_logs: bool) {
    let (level, format) = effective(config, verbose, json_logs);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr)
                        .with_ansi(true),
                )
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_lowers_level_to_debug() {
        let config = LoggingConfig::default();
        let (level, _) = effective(&config, true, false);
        assert_eq!(level, LogLevel::Debug);
    }

    #[test]
    fn test_verbose_flag_keeps_configured_trace() {
        let config = LoggingConfig {
            level: LogLevel::Trace,
            ..LoggingConfig::default()
        };
        let (level, _) = effective(&config, true, false);
        assert_eq!(level, LogLevel::Trace);
    }

    #[test]
    fn test_json_flag_overrides_configured_format() {
        let config = LoggingConfig::default();
        let (_, format) = effective(&config, false, true);
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn test_defaults_pass_through_unchanged() {
        let config = LoggingConfig::default();
        let (level, format) = effective(&config, false, false);
        assert_eq!(level, LogLevel::Info);
        assert_eq!(format, LogFormat::Pretty);
    }
}
