use crate::config::LoggingSettings;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging to stderr, and to `buildsync.log` in the configured
/// directory when one is set.
/// Returns a guard that must be held for the lifetime of the application
/// to ensure log messages are flushed.
pub fn init_logging(
    settings: &LoggingSettings,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.filter))?;

    let (file_layer, guard) = match &settings.dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = rolling::never(log_dir, "buildsync.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(guard)
}
