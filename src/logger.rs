//! Logging setup
//!
//! Built on `tracing` and `tracing-subscriber`, with one target per component
//! (`ember::ident`, `ember::action`, ...) filtered by the global [`LogConfig`].
//!
//! # Example
//! ```ignore
//! use ember::config::{init, Config};
//! use ember::logger::init_logger;
//!
//! init(Config::default());
//! init_logger().unwrap();
//! ```
//!
//! [`LogConfig`]: crate::config::LogConfig

use std::io;
use std::path::Path;
use std::sync::Arc;

use ember_config::Phase;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::config::{self, ConfigError, LogConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, multi-line (development)
    #[default]
    Pretty,
    Compact,
    /// Tool integration
    Json,
}

pub fn init_logger() -> Result<(), ConfigError> {
    init_with_format(LogFormat::default())
}

pub fn init_with_format(format: LogFormat) -> Result<(), ConfigError> {
    init_with_file(format, None::<&str>)
}

/// Initialize logging, additionally appending to `file` when given
///
/// Requires [`config::init`] to have run.
pub fn init_with_file<P: AsRef<Path>>(format: LogFormat, file: Option<P>) -> Result<(), ConfigError> {
    if !config::is_initialized() {
        return Err(ConfigError::NotInitialized);
    }
    let targets = targets(&config::config().log);

    let stdout_layer = create_format_layer(format, io::stdout).with_filter(targets.clone());

    let result = match file {
        Some(path) => {
            let handle = Arc::new(
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            );
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(handle)
                .with_filter(targets);
            tracing_subscriber::registry()
                .with(stdout_layer)
                .with(file_layer)
                .try_init()
        }
        None => tracing_subscriber::registry().with(stdout_layer).try_init(),
    };
    result.map_err(|_| ConfigError::SubscriberInstalled)
}

/// Per-component filter derived from the log config
pub fn targets(cfg: &LogConfig) -> Targets {
    Phase::ALL
        .iter()
        .fold(Targets::new().with_default(cfg.global), |targets, phase| {
            targets.with_target(phase.target(), cfg.level_for(*phase))
        })
}

fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

/// Whether DEBUG output is enabled for a component
#[inline]
pub fn is_enabled(phase: Phase) -> bool {
    match phase {
        Phase::Ident => tracing::enabled!(target: "ember::ident", tracing::Level::DEBUG),
        Phase::Action => tracing::enabled!(target: "ember::action", tracing::Level::DEBUG),
        Phase::Flow => tracing::enabled!(target: "ember::flow", tracing::Level::DEBUG),
        Phase::Frame => tracing::enabled!(target: "ember::frame", tracing::Level::DEBUG),
        Phase::Trace => tracing::enabled!(target: "ember::trace", tracing::Level::DEBUG),
        Phase::Interp => tracing::enabled!(target: "ember::interp", tracing::Level::DEBUG),
    }
}
