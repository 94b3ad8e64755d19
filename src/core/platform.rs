use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use std::fs;
use std::io;
use sysinfo::System;

/// A process found in the process table.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Path of the running image. Under a compatibility layer this is the loader, not the game.
    pub exe: Option<Utf8PathBuf>,
    pub cmd: Vec<String>,
}

/// Everything the linker and the process locator need from the host OS.
pub trait PlatformOps: Send + Sync {
    fn create_dir_link(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()>;

    /// Removes a directory link without touching what it points at.
    fn remove_dir_link(&self, path: &Utf8Path) -> io::Result<()>;

    fn is_dir_link(&self, path: &Utf8Path) -> bool;

    /// First process whose name matches any of `names`, in order of `names`.
    fn find_process(&self, names: &[&str]) -> Option<ProcessInfo>;

    /// Kills every process matching `names`. Returns how many were signalled.
    fn kill_processes(&self, names: &[&str]) -> usize;
}

/// The real OS: symlinks on POSIX, junctions on Windows, sysinfo for processes.
pub struct SystemPlatform {
    sys: Mutex<System>,
}

impl Default for SystemPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPlatform {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }

    fn matches(process: &sysinfo::Process, name: &str) -> bool {
        process.name().eq_ignore_ascii_case(name)
    }
}

impl PlatformOps for SystemPlatform {
    fn create_dir_link(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()> {
        #[cfg(windows)]
        {
            junction::create(source, destination)
        }
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(source, destination)
        }
    }

    fn remove_dir_link(&self, path: &Utf8Path) -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;

        #[cfg(windows)]
        {
            if meta.is_dir() || self.is_dir_link(path) {
                fs::remove_dir(path)
            } else {
                fs::remove_file(path)
            }
        }
        #[cfg(unix)]
        {
            if meta.is_symlink() {
                fs::remove_file(path)
            } else {
                Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Target is not a symlink",
                ))
            }
        }
    }

    fn is_dir_link(&self, path: &Utf8Path) -> bool {
        #[cfg(windows)]
        {
            if junction::exists(path).unwrap_or(false) {
                return true;
            }
        }
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn find_process(&self, names: &[&str]) -> Option<ProcessInfo> {
        let mut sys = self.sys.lock();
        sys.refresh_processes();

        names.iter().find_map(|name| {
            sys.processes()
                .values()
                .find(|p| Self::matches(p, name))
                .map(|p| ProcessInfo {
                    pid: p.pid().as_u32(),
                    name: p.name().to_string(),
                    exe: p.exe().and_then(|e| Utf8PathBuf::from_path_buf(e.to_path_buf()).ok()),
                    cmd: p.cmd().to_vec(),
                })
        })
    }

    fn kill_processes(&self, names: &[&str]) -> usize {
        let mut sys = self.sys.lock();
        sys.refresh_processes();

        sys.processes()
            .values()
            .filter(|p| names.iter().any(|n| Self::matches(p, n)))
            .filter(|p| p.kill())
            .count()
    }
}
