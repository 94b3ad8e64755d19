use crate::models::error::SError;
use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "spplice";

const DEFAULT_START_TIMEOUT_SECS: u64 = 300;

fn default_start_timeout() -> Option<u64> {
    Some(DEFAULT_START_TIMEOUT_SECS)
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Overrides the platform cache directory when set.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Index into `GameTarget::supported()`.
    #[serde(default)]
    pub game_index: usize,
    #[serde(default)]
    pub randomize_netcon_port: bool,
    /// `None` waits forever for the game to start.
    #[serde(default = "default_start_timeout")]
    pub process_start_timeout_secs: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            cache_enabled: true,
            game_index: 0,
            randomize_netcon_port: false,
            process_start_timeout_secs: default_start_timeout(),
        }
    }
}

impl AppSettings {
    pub fn load() -> Result<AppSettings, confy::ConfyError> {
        confy::load(APP_NAME, None)
    }

    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, None, self)
    }

    /// Persists new settings unless an installation is in flight.
    pub fn update(&self, busy: bool) -> Result<(), SError> {
        if busy {
            return Err(SError::Busy);
        }
        self.save().map_err(Into::into)
    }
}

/// Resolved on-disk locations for logs and the package cache.
#[derive(Clone, Debug)]
pub struct AppPaths {
    pub app_dir: Utf8PathBuf,
    pub cache_dir: Utf8PathBuf,
}

impl AppPaths {
    pub fn resolve(settings: &AppSettings) -> Result<Self, SError> {
        let dirs = ProjectDirs::from("com", "p2r3", APP_NAME);

        let fallback = || {
            std::env::current_exe()
                .ok()
                .and_then(|exe_path| exe_path.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."))
        };

        let app_dir = dirs
            .as_ref()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(fallback);

        let cache_dir = match &settings.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs
                .as_ref()
                .map(|d| d.cache_dir().to_path_buf())
                .unwrap_or_else(|| fallback().join("cache")),
        };

        Ok(Self {
            app_dir: Utf8PathBuf::try_from(app_dir)?,
            cache_dir: Utf8PathBuf::try_from(cache_dir)?,
        })
    }
}
