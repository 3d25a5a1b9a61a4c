use std::{path::Path, sync::OnceLock};

// Keeps the non-blocking writer alive for the lifetime of the process.
static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initialise the tracing subscriber: stderr plus a rolling daily log file
/// under `<data_dir>/logs/`.
///
/// Verbosity is controlled by the `RUST_LOG` environment variable (defaults
/// to `info` when unset). All `log::` call sites are forwarded into the
/// tracing pipeline via `LogTracer`.
pub fn init(data_dir: &Path) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "chatwarden.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false), // no colour escape codes in log files
        )
        .try_init()
        .ok();

    // Forward all log:: macro call sites into the tracing pipeline.
    tracing_log::LogTracer::init().ok();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ChatWarden started");
}
