//! Logging initialization
//!
//! Logs go to a file so that command output on stdout stays clean.
//! RUST_LOG takes precedence over the configured level.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogConfig;

/// Build the filter from RUST_LOG, falling back to the configured level
fn build_filter(config: &LogConfig) -> EnvFilter {
    build_filter_with_env(config, std::env::var(EnvFilter::DEFAULT_ENV).ok())
}

fn build_filter_with_env(config: &LogConfig, rust_log: Option<String>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(&config.level))
}

/// Install the global subscriber writing to `log_file`.
///
/// The returned guard flushes buffered lines on drop and must be held for
/// the life of the process.
pub fn init(config: &LogConfig, log_file: &Path) -> anyhow::Result<WorkerGuard> {
    let directory = log_file.parent().unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log path {:?} has no file name", log_file))?;

    std::fs::create_dir_all(directory)?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::registry().with(build_filter(config));

    if config.json {
        subscriber
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()?;
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LogConfig {
        LogConfig {
            level: level.to_string(),
            json: false,
        }
    }

    #[test]
    fn build_filter_uses_configured_level_without_rust_log() {
        let filter = build_filter_with_env(&config("debug"), None);

        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn build_filter_prefers_rust_log() {
        let filter = build_filter_with_env(&config("debug"), Some("warn".to_string()));

        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn build_filter_falls_back_on_invalid_rust_log() {
        let filter =
            build_filter_with_env(&config("info"), Some("modcatalog=notalevel".to_string()));

        assert_eq!(filter.to_string(), "info");
    }
}
