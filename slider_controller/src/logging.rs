use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt as _,
    EnvFilter, Layer as _,
};

use crate::config::LoggingConfig;

/// Log file name prefix inside the configured directory.
const FILE_PREFIX: &str = "slider_controller.log";

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// level. The returned guard flushes the file writer and must live as long
/// as the process logs.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = if config.json {
                fmt::Layer::new().json().with_writer(writer).boxed()
            } else {
                fmt::Layer::new()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .with(file_layer)
        .with(filter);

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global subscriber");

    guard
}
