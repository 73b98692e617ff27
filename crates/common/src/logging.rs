//! Logging and tracing initialization.

use std::fs::File;
use std::sync::Arc;

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` in the environment overrides the configured level filter.
/// When a log file is configured, output goes there instead of stderr;
/// if the file cannot be opened, logging falls back to stderr and warns
/// once the subscriber is up.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut open_error = None;
    let log_file = config.file.as_ref().and_then(|path| {
        File::create(path)
            .map(Arc::new)
            .map_err(|e| open_error = Some((path.clone(), e)))
            .ok()
    });

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(log_file.is_none())
        .with_target(true);

    match (config.json, log_file) {
        (true, Some(file)) => {
            tracing::subscriber::set_global_default(builder.json().with_writer(file).finish()).ok()
        }
        (true, None) => tracing::subscriber::set_global_default(builder.json().finish()).ok(),
        (false, Some(file)) => {
            tracing::subscriber::set_global_default(builder.with_writer(file).finish()).ok()
        }
        (false, None) => tracing::subscriber::set_global_default(builder.finish()).ok(),
    };

    if let Some((path, e)) = open_error {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Could not open log file; logging to stderr"
        );
    }
}
