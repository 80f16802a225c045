//! Subscriber setup
//!
//! Console output is always on. When `logging.local_enabled` is set, a JSON
//! layer writes to a rolling file under `logging.local_path`.

use crate::config::LoggingConfig;
use crate::domain::{CapacityError, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "capacity-mapping.log";

/// Keeps the background file writer alive
///
/// Buffered file output is flushed when this is dropped, so hold it until the
/// program is about to exit.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard(Option<WorkerGuard>);

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Errors
///
/// Returns a configuration error for an unknown level, if the log
/// directory cannot be created, or if a subscriber is already installed.
pub fn init_logging(level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let level = parse_log_level(level)?;
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
    };

    let console = fmt::layer().with_target(true).with_filter(filter());

    let (file, guard) = if config.local_enabled {
        std::fs::create_dir_all(&config.local_path).map_err(|e| {
            CapacityError::Configuration(format!(
                "Cannot create log directory {}: {e}",
                config.local_path
            ))
        })?;

        let appender = RollingFileAppender::new(
            parse_rotation(&config.local_rotation),
            &config.local_path,
            LOG_FILE_PREFIX,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(writer)
            .with_filter(filter());
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| CapacityError::Configuration(format!("Logging already initialized: {e}")))?;

    tracing::debug!(
        %level,
        file_logging = config.local_enabled,
        path = %config.local_path,
        "Logging initialized"
    );

    Ok(LoggingGuard(guard))
}

fn default_directive(level: Level) -> String {
    format!("capacity_mapping={}", level.as_str().to_lowercase())
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// Level names as accepted by `[application].log_level`, in any case
fn parse_log_level(level: &str) -> Result<Level> {
    if level.chars().all(|c| c.is_ascii_alphabetic()) {
        if let Ok(parsed) = Level::from_str(level) {
            return Ok(parsed);
        }
    }
    Err(CapacityError::Configuration(format!(
        "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
    )))
}
