//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/meteor/logs/`.
/// Log level is controlled by the `METEOR_LOG` environment variable.
///
/// # Examples
/// ```bash
/// METEOR_LOG=debug meteor launch.toml
/// METEOR_LOG=meteor_tools=trace meteor launch.toml
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir).map_err(|e| {
        Error::config(format!(
            "cannot create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "meteor.log");

    // Default to info for our crates, allow override via METEOR_LOG
    let env_filter = EnvFilter::try_from_env("METEOR_LOG").unwrap_or_else(|_| {
        EnvFilter::new("meteor=info,meteor_agent=info,meteor_tools=info,warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("meteor starting, log directory: {}", log_dir.display());

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("meteor").join("logs")
}

/// Get the log file path
pub fn get_current_log_file() -> PathBuf {
    get_log_directory().join("meteor.log")
}
