use crate::config::GeneralConfig;
use crate::error::ConfigError;
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_NAME: &str = "parikshak";

/// Maps a configured level name onto a `tracing` level. Unknown names fall back to `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// `parikshak_<YYYYmmdd_HHMMSS>.log`
pub fn log_file_name(now: DateTime<Local>) -> String {
    format!("{}_{}.log", LOG_NAME, now.format("%Y%m%d_%H%M%S"))
}

fn file_appender(dir: &Path, now: DateTime<Local>) -> Result<RollingFileAppender, ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(log_file_name(now))
        .build(dir)
        .map_err(|e| ConfigError::Logging(e.to_string()))
}

/// Installs the console and file layers. `RUST_LOG` wins over the configured level.
///
/// The returned guard flushes the file layer on drop, keep it alive until exit.
pub fn init(general: &GeneralConfig) -> Result<WorkerGuard, ConfigError> {
    let appender = file_appender(&general.output_dir, Local::now())?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{}={}",
            LOG_NAME,
            level_directive(&general.log_level)
        ))
    });

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}
