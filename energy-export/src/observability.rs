use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";

/// Human-readable logs on stdout plus JSON lines in `<script_name>.log`.
///
/// Keep the returned guard alive until exit so the file writer flushes.
pub fn init_tracing(script_name: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", format!("{script_name}.log"));
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().json().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}
