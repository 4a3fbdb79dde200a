use crate::config::LoggingConfig;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "rh_eval=info";

/// Initializes the logging system with both console and file output.
///
/// The returned guard flushes the file writer when dropped, so `main` holds it
/// until exit.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    // Ensure logs directory exists
    let _ = fs::create_dir_all(&config.dir);

    // Create a non-blocking file appender for daily log rotation
    let file_appender = tracing_appender::rolling::daily(&config.dir, &config.file_prefix);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // JSON for the file, human-readable for the console
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
