//! Tracing setup: human-readable events on stderr, errors from this crate
//! mirrored to a log file.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Name of the error log inside the log directory.
pub const ERROR_LOG_FILE: &str = "taxi_relay.log";

const DEFAULT_STDERR_FILTER: &str = "info,reqwest=warn,hyper=warn";

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn init(log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::never(log_dir, ERROR_LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(stderr_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(error_file_filter()),
        )
        .init();

    Ok(guard)
}

/// `RUST_LOG` when set, otherwise info with noisy HTTP crates quieted.
fn stderr_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_STDERR_FILTER))
}

/// ERROR events from this crate only.
pub fn error_file_filter() -> Targets {
    Targets::new().with_target(env!("CARGO_CRATE_NAME"), Level::ERROR)
}
