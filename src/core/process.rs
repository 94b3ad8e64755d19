use crate::core::platform::{PlatformOps, ProcessInfo};
use crate::models::error::SError;
use camino::Utf8PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct ProcessLocator;

impl ProcessLocator {
    /// Resolves the on-disk executable of the first running process that matches `names`.
    pub fn find_executable_path(platform: &dyn PlatformOps, names: &[&str]) -> Option<Utf8PathBuf> {
        platform
            .find_process(names)
            .and_then(|info| Self::resolve_executable(&info))
    }

    /// Under a compatibility layer the image is the loader, so the game path comes from
    /// the first command-line argument instead (`Z:\home\...\portal2.exe`).
    pub fn resolve_executable(info: &ProcessInfo) -> Option<Utf8PathBuf> {
        if let Some(exe) = &info.exe {
            let same_name = exe
                .file_name()
                .is_some_and(|n| n.eq_ignore_ascii_case(&info.name));
            if same_name {
                return Some(exe.clone());
            }
        }

        let arg0 = info.cmd.first()?;
        let trimmed = arg0
            .strip_prefix("Z:")
            .or_else(|| arg0.strip_prefix("z:"))
            .unwrap_or(arg0);

        let unix_style = if cfg!(windows) {
            trimmed.to_string()
        } else {
            trimmed.replace('\\', "/")
        };

        if unix_style.is_empty() {
            info.exe.clone()
        } else {
            Some(Utf8PathBuf::from(unix_style))
        }
    }

    /// Polls until a matching process appears. `timeout` of `None` waits forever;
    /// `cancelled` is checked between polls.
    pub fn wait_for_start(
        platform: &dyn PlatformOps,
        names: &[&str],
        interval: Duration,
        timeout: Option<Duration>,
        cancelled: &dyn Fn() -> bool,
    ) -> Result<Utf8PathBuf, SError> {
        let started = Instant::now();
        loop {
            if let Some(path) = Self::find_executable_path(platform, names) {
                debug!(%path, "Game process found");
                return Ok(path);
            }
            if cancelled() {
                return Err(SError::Cancelled);
            }
            if timeout.is_some_and(|t| started.elapsed() >= t) {
                return Err(SError::Timeout(format!(
                    "none of {names:?} started within {}s",
                    started.elapsed().as_secs()
                )));
            }
            thread::sleep(interval);
        }
    }

    /// Polls until no matching process remains or `stop` returns true.
    pub fn wait_for_exit(
        platform: &dyn PlatformOps,
        names: &[&str],
        interval: Duration,
        stop: &dyn Fn() -> bool,
    ) {
        while platform.find_process(names).is_some() {
            if stop() {
                return;
            }
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, exe: Option<&str>, cmd: &[&str]) -> ProcessInfo {
        ProcessInfo {
            pid: 1,
            name: name.into(),
            exe: exe.map(Utf8PathBuf::from),
            cmd: cmd.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn native_process_uses_image_path() {
        let p = info(
            "portal2_linux",
            Some("/steam/common/Portal 2/portal2_linux"),
            &["/steam/common/Portal 2/portal2_linux", "-game", "portal2"],
        );
        assert_eq!(
            ProcessLocator::resolve_executable(&p),
            Some(Utf8PathBuf::from("/steam/common/Portal 2/portal2_linux"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn compat_layer_process_uses_first_argument() {
        let p = info(
            "portal2.exe",
            Some("/steam/proton/files/bin/wine64-preloader"),
            &["Z:\\steam\\common\\Portal 2\\portal2.exe", "-game", "portal2"],
        );
        assert_eq!(
            ProcessLocator::resolve_executable(&p),
            Some(Utf8PathBuf::from("/steam/common/Portal 2/portal2.exe"))
        );
    }
}
