pub mod install;
pub mod maintenance;

use crate::config::{AppPaths, AppSettings};
use crate::core::download::HttpDownloader;
use crate::core::launcher::SteamLauncher;
use crate::core::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::core::platform::{PlatformOps, SystemPlatform};
use crate::models::error::SError;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "spplice", version, about = "Installs packages into Portal 2 for one play session")]
pub struct Cli {
    /// Index of the game to target for this run (see `games`).
    #[arg(long, global = true)]
    pub game: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Installs manifests (`.json`) or local archives (`.tar.xz`); several are merged.
    Install {
        #[arg(required = true)]
        packages: Vec<Utf8PathBuf>,
    },
    /// Merges extracted package directories into `destination` without launching anything.
    Merge {
        destination: Utf8PathBuf,
        #[arg(required = true)]
        sources: Vec<Utf8PathBuf>,
    },
    /// Deletes every cached archive and icon.
    ClearCache,
    /// Removes a link left behind by a crashed run.
    Recover,
    /// Lists supported games, optionally saving a new default.
    Games {
        #[arg(long)]
        select: Option<usize>,
    },
}

/// Builds the orchestrator on the real OS, Steam and HTTP.
pub fn build_orchestrator(settings: &AppSettings, paths: &AppPaths) -> Result<Orchestrator, SError> {
    let options = OrchestratorOptions::from_settings(settings, paths)?;
    let platform: Arc<dyn PlatformOps> = Arc::new(SystemPlatform::new());
    let launcher = Arc::new(SteamLauncher::new(platform.clone()));
    let downloader = Arc::new(HttpDownloader::default());
    Ok(Orchestrator::new(options, platform, launcher, downloader))
}

pub fn run(cli: Cli, mut settings: AppSettings, paths: AppPaths) -> Result<(), SError> {
    if let Some(index) = cli.game {
        settings.game_index = index;
    }

    match cli.command {
        Command::Games { select } => maintenance::games(&mut settings, select),
        Command::Merge { destination, sources } => {
            maintenance::merge(&paths, &sources, &destination)
        }
        Command::ClearCache => maintenance::clear_cache(&build_orchestrator(&settings, &paths)?),
        Command::Recover => maintenance::recover(&build_orchestrator(&settings, &paths)?),
        Command::Install { packages } => {
            install::install(&build_orchestrator(&settings, &paths)?, &packages)
        }
    }
}
