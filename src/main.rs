use clap::Parser;
use spplice_lib::commands::{self, Cli};
use spplice_lib::config::{AppPaths, AppSettings};
use spplice_lib::utils::logging;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = AppSettings::load().unwrap_or_else(|e| {
        eprintln!("Failed to load settings, using defaults: {e}");
        AppSettings::default()
    });
    let paths = match AppPaths::resolve(&settings) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init(&paths.app_dir);

    match commands::run(cli, settings, paths) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
