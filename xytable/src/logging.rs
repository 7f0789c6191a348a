use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::{Layer, SubscriberExt as _},
    registry::Registry,
    util::SubscriberInitExt as _,
    EnvFilter,
};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "xytable.log";

type FilteredRegistry = tracing_subscriber::layer::Layered<EnvFilter, Registry>;

/// `RUST_LOG` wins over the configured level; `verbose` forces debug.
fn env_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber. Keep the returned guard alive for as long
/// as file logging should keep flushing.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<Box<dyn Layer<FilteredRegistry> + Send + Sync>> = vec![fmt::Layer::new()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_span_events(FmtSpan::CLOSE)
        .boxed()];

    let guard = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::Layer::new().with_writer(writer).with_ansi(false);

            layers.push(if config.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            });
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(config, verbose))
        .with(layers)
        .try_init()?;

    Ok(guard)
}
