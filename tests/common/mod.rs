#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use spplice_lib::core::download::Downloader;
use spplice_lib::core::launcher::GameLauncher;
use spplice_lib::core::platform::{PlatformOps, ProcessInfo, SystemPlatform};
use spplice_lib::models::error::SError;
use spplice_lib::models::game::GameTarget;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::sync::Arc;
use tempfile::TempDir;
use xz2::write::XzEncoder;

/// Temp dir plus its UTF-8 path. Keep the `TempDir` alive for the test's duration.
pub fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
    (tmp, root)
}

/// Writes a `.tar.xz` holding `files` as `(relative path, contents)` pairs.
pub fn write_archive(path: &Utf8Path, files: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut builder = tar::Builder::new(XzEncoder::new(file, 6));

    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}

/// Like [`write_archive`], but stores `name` verbatim, bypassing the builder's path checks.
pub fn write_archive_with_raw_entry(path: &Utf8Path, name: &str, contents: &str, safe: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut builder = tar::Builder::new(XzEncoder::new(file, 6));

    let mut header = tar::Header::new_old();
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, contents.as_bytes()).unwrap();

    for (name, contents) in safe {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}

/// Archive holding a single symlink entry `name -> target`.
pub fn write_archive_with_symlink(path: &Utf8Path, name: &str, target: &Utf8Path) {
    let file = File::create(path).unwrap();
    let mut builder = tar::Builder::new(XzEncoder::new(file, 6));

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);
    header.set_link_name(target.as_std_path()).unwrap();
    header.set_cksum();
    builder.append_data(&mut header, name, io::empty()).unwrap();

    builder.into_inner().unwrap().finish().unwrap();
}

/// Real links through `SystemPlatform`, with a process table the test controls.
#[derive(Default)]
pub struct FakePlatform {
    links: SystemPlatform,
    processes: Mutex<Vec<ProcessInfo>>,
}

impl FakePlatform {
    pub fn spawn(&self, name: &str, exe: &Utf8Path) {
        let mut processes = self.processes.lock();
        let pid = processes.len() as u32 + 100;
        processes.push(ProcessInfo {
            pid,
            name: name.into(),
            exe: Some(exe.to_owned()),
            cmd: vec![exe.to_string()],
        });
    }

    pub fn exit_all(&self) {
        self.processes.lock().clear();
    }

    pub fn running(&self) -> usize {
        self.processes.lock().len()
    }
}

impl PlatformOps for FakePlatform {
    fn create_dir_link(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()> {
        self.links.create_dir_link(source, destination)
    }

    fn remove_dir_link(&self, path: &Utf8Path) -> io::Result<()> {
        self.links.remove_dir_link(path)
    }

    fn is_dir_link(&self, path: &Utf8Path) -> bool {
        self.links.is_dir_link(path)
    }

    fn find_process(&self, names: &[&str]) -> Option<ProcessInfo> {
        let processes = self.processes.lock();
        names
            .iter()
            .find_map(|name| processes.iter().find(|p| p.name == *name).cloned())
    }

    fn kill_processes(&self, names: &[&str]) -> usize {
        let mut processes = self.processes.lock();
        let before = processes.len();
        processes.retain(|p| !names.contains(&p.name.as_str()));
        before - processes.len()
    }
}

/// "Starts" the game by putting it in the fake process table.
pub struct FakeLauncher {
    pub platform: Arc<FakePlatform>,
    pub executable: Utf8PathBuf,
    pub launches: Mutex<Vec<(Option<u16>, Vec<String>)>>,
    pub start_process: bool,
}

impl FakeLauncher {
    pub fn new(platform: Arc<FakePlatform>, executable: &Utf8Path) -> Self {
        Self {
            platform,
            executable: executable.to_owned(),
            launches: Mutex::new(Vec::new()),
            start_process: true,
        }
    }
}

impl GameLauncher for FakeLauncher {
    fn launch(&self, game: &GameTarget, netcon_port: Option<u16>, args: &[String]) -> Result<(), SError> {
        self.launches.lock().push((netcon_port, args.to_vec()));
        if self.start_process {
            self.platform.spawn(&game.process_names[0], &self.executable);
        }
        Ok(())
    }
}

/// Serves canned bodies by URL and counts requests.
#[derive(Default)]
pub struct FakeDownloader {
    pub bodies: Mutex<HashMap<String, Vec<u8>>>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().insert(url.to_string(), body);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Downloader for FakeDownloader {
    fn download_file(&self, url: &str, destination: &Utf8Path) -> Result<(), SError> {
        self.requests.lock().push(url.to_string());
        let body = self
            .bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| SError::Acquisition(format!("404 {url}")))?;
        fs::write(destination, body)?;
        Ok(())
    }

    fn download_string(&self, url: &str) -> Result<String, SError> {
        self.requests.lock().push(url.to_string());
        self.bodies
            .lock()
            .get(url)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or_else(|| SError::Acquisition(format!("404 {url}")))
    }
}

/// `<root>/game/portal2_linux` plus the game's own `portal2` content directory.
pub fn fake_game_install(root: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    let game_dir = root.join("game");
    fs::create_dir_all(game_dir.join("portal2/maps/soundcache")).unwrap();
    fs::write(game_dir.join("portal2/maps/soundcache/_master.cache"), "sounds").unwrap();
    let executable = game_dir.join("portal2_linux");
    fs::write(&executable, "").unwrap();
    (game_dir, executable)
}
