use crate::models::package::PackageDescriptor;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum InstallState {
    Idle = 0,
    Installing = 1,
    Installed = 2,
}

/// The live link from session content into the game directory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LinkRecord {
    pub source: Utf8PathBuf,
    pub destination: Utf8PathBuf,
    /// Where pre-existing non-link content at `destination` was moved to.
    pub backup: Option<Utf8PathBuf>,
}

/// Per-source bookkeeping for one merge call.
#[derive(Clone, Debug)]
pub struct MergeSourceState {
    pub index: usize,
    pub merge_prefix: String,
    pub script_globals: std::collections::BTreeSet<String>,
    /// Destination paths of processed scripts, under their original names.
    pub script_files: Vec<Utf8PathBuf>,
}

/// The one active installation. Owned by the orchestrator; `None` in its slot means idle.
#[derive(Debug)]
pub struct InstallationSession {
    pub id: u64,
    pub state: InstallState,
    pub game_directory: Option<Utf8PathBuf>,
    pub temp_content_directory: Utf8PathBuf,
    pub netcon_port: Option<u16>,
    pub active_sources: Vec<PackageDescriptor>,
    pub link: Option<LinkRecord>,
    pub cancel_requested: bool,
    /// Raised on teardown so the automation thread stops at its next sleep.
    pub automation_stop: Arc<AtomicBool>,
}

impl InstallationSession {
    pub fn new(id: u64, temp_content_directory: Utf8PathBuf, sources: Vec<PackageDescriptor>) -> Self {
        Self {
            id,
            state: InstallState::Installing,
            game_directory: None,
            temp_content_directory,
            netcon_port: None,
            active_sources: sources,
            link: None,
            cancel_requested: false,
            automation_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            game_directory: self.game_directory.clone(),
            temp_content_directory: self.temp_content_directory.clone(),
            netcon_port: self.netcon_port,
            titles: self.active_sources.iter().map(|p| p.title.clone()).collect(),
            link: self.link.clone(),
        }
    }
}

/// Read-only view of a session handed out to callers.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub id: u64,
    pub state: InstallState,
    pub game_directory: Option<Utf8PathBuf>,
    pub temp_content_directory: Utf8PathBuf,
    pub netcon_port: Option<u16>,
    pub titles: Vec<String>,
    pub link: Option<LinkRecord>,
}
