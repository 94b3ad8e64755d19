use crate::models::paths::AppDirPaths;
use camino::Utf8Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SPPLICE_LOG";

/// Installs the global subscriber: stderr plus `<app_dir>/log.txt`.
/// Keep the returned guard alive for as long as file output is wanted.
pub fn init(app_dir: &Utf8Path) -> WorkerGuard {
    let log_path = AppDirPaths::new(app_dir).log;
    let _ = std::fs::create_dir_all(app_dir);

    let file_name = log_path.file_name().unwrap_or("log.txt");
    let appender = tracing_appender::rolling::never(app_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialised: {e}");
    }

    guard
}
