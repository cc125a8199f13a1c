//! Logging infrastructure for synheart-wellbeing
//!
//! Hosts call [`init`] once. Logs go to stderr, or to a daily rolling file
//! when `logging.directory` is configured. `RUST_LOG` overrides the
//! configured level.

use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;
use crate::error::{Result, WellbeingError};

const LOG_FILE_NAME: &str = "wellbeing.log";

/// Initialize the logging system
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let guard = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .try_init()
                .map_err(|e| WellbeingError::Config(format!("logging already initialized: {e}")))?;
            guard
        }
        None => {
            let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
            let stderr_layer = fmt::layer().with_writer(non_blocking).with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .map_err(|e| WellbeingError::Config(format!("logging already initialized: {e}")))?;
            guard
        }
    };

    tracing::info!(
        level = %config.level,
        directory = ?config.directory,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (logs to the test writer)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Path of today's log file prefix within `directory`
pub fn log_file_path(directory: &Path) -> PathBuf {
    directory.join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path(Path::new("/var/log/wellbeing"));
        assert!(path.ends_with("wellbeing.log"));
    }
}
