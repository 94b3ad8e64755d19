use crate::core::platform::PlatformOps;
use crate::core::process::ProcessLocator;
use crate::models::error::SError;
use crate::models::game::GameTarget;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::info;

/// Candidate names of the Steam client, which brokers game launches.
pub const STEAM_PROCESS_NAMES: [&str; 4] = ["steam", "steam.exe", "steamwebhelper", "Steam"];

/// Starts the game with the session's content enabled.
pub trait GameLauncher: Send + Sync {
    fn launch(&self, game: &GameTarget, netcon_port: Option<u16>, args: &[String]) -> Result<(), SError>;
}

/// Arguments handed to the Steam client. Package arguments always come last.
pub fn build_launch_args(app_id: u32, netcon_port: Option<u16>, package_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "-applaunch".to_string(),
        app_id.to_string(),
        "-tempcontent".to_string(),
    ];
    if let Some(port) = netcon_port {
        args.push("-netconport".into());
        args.push(port.to_string());
    }
    args.extend(package_args.iter().cloned());
    args
}

pub struct SteamLauncher {
    platform: Arc<dyn PlatformOps>,
}

impl SteamLauncher {
    pub fn new(platform: Arc<dyn PlatformOps>) -> Self {
        Self { platform }
    }
}

impl GameLauncher for SteamLauncher {
    fn launch(&self, game: &GameTarget, netcon_port: Option<u16>, args: &[String]) -> Result<(), SError> {
        let steam = ProcessLocator::find_executable_path(self.platform.as_ref(), &STEAM_PROCESS_NAMES)
            .ok_or_else(|| SError::Launch("Steam is not running".into()))?;

        let args = build_launch_args(game.app_id, netcon_port, args);
        info!(%steam, ?args, "Launching {}", game.name);

        Command::new(steam.as_std_path())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SError::Launch(format!("failed to start Steam: {e}")))?;
        Ok(())
    }
}
