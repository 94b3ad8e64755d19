use crate::config::{AppPaths, AppSettings};
use crate::core::cache::PackageCache;
use crate::core::decompression::Decompression;
use crate::core::download::Downloader;
use crate::core::launcher::GameLauncher;
use crate::core::linker::Linker;
use crate::core::merge::Merger;
use crate::core::netcon;
use crate::core::platform::PlatformOps;
use crate::core::process::ProcessLocator;
use crate::core::sandbox::{self, fs::SandboxFs, AutomationContext};
use crate::models::error::SError;
use crate::models::event::InstallEvent;
use crate::models::game::GameTarget;
use crate::models::package::PackageDescriptor;
use crate::models::paths::{CachePaths, ContentPaths};
use crate::models::session::{InstallState, InstallationSession, LinkRecord, SessionSnapshot};
use crate::utils::file::FileUtils;
use crate::utils::thread::{with_session, with_session_mut};
use crate::utils::toml::Toml;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone, Debug)]
pub struct OrchestratorOptions {
    pub cache_dir: Utf8PathBuf,
    pub cache_enabled: bool,
    pub game: GameTarget,
    pub randomize_netcon_port: bool,
    /// `None` waits for the game forever.
    pub process_start_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl OrchestratorOptions {
    pub fn new(cache_dir: &Utf8Path, game: GameTarget) -> Self {
        Self {
            cache_dir: cache_dir.to_owned(),
            cache_enabled: true,
            game,
            randomize_netcon_port: false,
            process_start_timeout: Some(Duration::from_secs(300)),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_settings(settings: &AppSettings, paths: &AppPaths) -> Result<Self, SError> {
        let game = GameTarget::by_index(settings.game_index).ok_or_else(|| {
            SError::ParseError(format!("no supported game at index {}", settings.game_index))
        })?;

        Ok(Self {
            cache_dir: paths.cache_dir.clone(),
            cache_enabled: settings.cache_enabled,
            game,
            randomize_netcon_port: settings.randomize_netcon_port,
            process_start_timeout: settings.process_start_timeout_secs.map(Duration::from_secs),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }
}

/// Owns the one installation session and drives it from download to cleanup.
/// Cloning is cheap; all clones share the same session slot.
#[derive(Clone)]
pub struct Orchestrator {
    options: Arc<OrchestratorOptions>,
    cache: PackageCache,
    platform: Arc<dyn PlatformOps>,
    launcher: Arc<dyn GameLauncher>,
    downloader: Arc<dyn Downloader>,
    session: Arc<Mutex<Option<InstallationSession>>>,
    next_id: Arc<AtomicU64>,
    subscribers: Arc<Mutex<Vec<Sender<InstallEvent>>>>,
}

impl Orchestrator {
    pub fn new(
        options: OrchestratorOptions,
        platform: Arc<dyn PlatformOps>,
        launcher: Arc<dyn GameLauncher>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        let cache = PackageCache::new(&options.cache_dir, options.cache_enabled);
        Self {
            options: Arc::new(options),
            cache,
            platform,
            launcher,
            downloader,
            session: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn paths(&self) -> CachePaths {
        CachePaths::new(&self.options.cache_dir)
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    pub fn state(&self) -> InstallState {
        with_session(&self.session, |s| s.state).unwrap_or(InstallState::Idle)
    }

    pub fn is_busy(&self) -> bool {
        self.state() != InstallState::Idle
    }

    pub fn session(&self) -> Option<SessionSnapshot> {
        with_session(&self.session, InstallationSession::snapshot)
    }

    pub fn subscribe(&self) -> Receiver<InstallEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn publish(&self, event: InstallEvent) {
        debug!(?event, "Publishing");
        self.subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Starts installing `packages`; more than one gets merged. Fails with `Busy` and
    /// changes nothing while another session exists.
    #[instrument(skip_all, fields(count = packages.len()))]
    pub fn install(&self, packages: Vec<PackageDescriptor>) -> Result<JoinHandle<()>, SError> {
        if packages.is_empty() {
            return Err(SError::Acquisition("no packages selected".into()));
        }

        let id = {
            let mut guard = self.session.lock();
            if guard.is_some() {
                return Err(SError::Busy);
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            *guard = Some(InstallationSession::new(id, self.paths().tempcontent, packages.clone()));
            id
        };

        info!(id, titles = ?packages.iter().map(|p| &p.title).collect::<Vec<_>>(), "Installing");
        self.publish(InstallEvent::StateChanged(InstallState::Installing));

        let worker = self.clone();
        thread::Builder::new()
            .name(format!("spplice-install-{id}"))
            .spawn(move || worker.run_worker(id, packages))
            .map_err(|e| {
                self.teardown(id);
                SError::Unexpected(Some(format!("failed to spawn install worker: {e}")))
            })
    }

    fn run_worker(&self, id: u64, packages: Vec<PackageDescriptor>) {
        match self.prepare(id, &packages) {
            Ok(()) => self.supervise(id),
            Err(SError::Cancelled) => {
                info!(id, "Installation cancelled");
                self.teardown(id);
            }
            Err(e) => {
                error!(id, "Installation aborted: {e}");
                self.publish(InstallEvent::Failed(e.to_string()));
                self.teardown(id);
            }
        }
    }

    fn checkpoint(&self, id: u64) -> Result<(), SError> {
        with_session_mut(&self.session, id, |_| ())
    }

    fn prepare(&self, id: u64, packages: &[PackageDescriptor]) -> Result<(), SError> {
        let paths = self.paths();
        let game = &self.options.game;

        // 1. Fresh content directory
        FileUtils::remove_dir_if_exists(&paths.tempcontent)?;
        fs::create_dir_all(&paths.tempcontent)?;

        // 2. Archives into place
        if let [single] = packages {
            self.acquire_and_extract(id, single, &paths.tempcontent)?;
        } else {
            FileUtils::remove_dir_if_exists(&paths.merge)?;
            let mut sources = Vec::with_capacity(packages.len());
            for (i, package) in packages.iter().enumerate() {
                let dir = paths.merge.join(i.to_string());
                self.acquire_and_extract(id, package, &dir)?;
                sources.push(dir);
            }
            Merger::merge_sources(&sources, &paths.tempcontent);
            FileUtils::remove_dir_if_exists(&paths.merge)?;
        }
        self.checkpoint(id)?;

        // 3. Sound cache placeholder so the game skips regenerating it
        let content = ContentPaths::new(&paths.tempcontent);
        fs::create_dir_all(&content.sound_cache_dir)?;

        // 4. Console port only when there is a script to talk to the game
        let has_entry_point = content.entry_point.is_file();
        if !has_entry_point && content.js_entry_point.is_file() {
            warn!(id, "Package ships main.js; JavaScript automation is not supported, skipping it");
        }
        let netcon_port =
            has_entry_point.then(|| netcon::choose_port(self.options.randomize_netcon_port));
        with_session_mut(&self.session, id, |s| s.netcon_port = netcon_port)?;

        // 5. Launch and wait for the game to show up
        let args: Vec<String> = packages.iter().flat_map(|p| p.launch_args.clone()).collect();
        self.launcher.launch(game, netcon_port, &args)?;

        let names = game.process_name_refs();
        let cancelled = || self.checkpoint(id).is_err();
        let executable = ProcessLocator::wait_for_start(
            self.platform.as_ref(),
            &names,
            self.options.poll_interval,
            self.options.process_start_timeout,
            &cancelled,
        )?;
        let game_dir = executable
            .parent()
            .map(Utf8Path::to_owned)
            .ok_or_else(|| SError::Launch(format!("cannot resolve game directory from {executable}")))?;
        info!(%game_dir, "Game directory resolved");
        with_session_mut(&self.session, id, |s| s.game_directory = Some(game_dir.clone()))?;

        // 6. Link content into the game
        let destination = game.link_destination(&game_dir);
        let record = Linker::link_directory(self.platform.as_ref(), &paths.tempcontent, &destination)?;
        self.record_link(id, record)?;

        let master_cache = ContentPaths::new(&game.content_root(&game_dir)).sound_cache;
        if master_cache.is_file() {
            if let Err(e) = Linker::link_file(&master_cache, &content.sound_cache) {
                warn!("Failed to link sound cache: {e}");
            }
        }

        // 7. Installed
        let stop = with_session_mut(&self.session, id, |s| {
            s.state = InstallState::Installed;
            s.automation_stop.clone()
        })?;
        info!(id, "Package installed");
        self.publish(InstallEvent::StateChanged(InstallState::Installed));

        if let (true, Some(port)) = (has_entry_point, netcon_port) {
            let context = AutomationContext {
                fs: SandboxFs::new(&paths.tempcontent, &game_dir, &destination),
                netcon_port: port,
                downloader: self.downloader.clone(),
                stop,
            };
            self.spawn_automation(content.entry_point, context);
        }

        Ok(())
    }

    fn acquire_and_extract(
        &self,
        id: u64,
        package: &PackageDescriptor,
        destination: &Utf8Path,
    ) -> Result<(), SError> {
        self.checkpoint(id)?;
        let archive = self.cache.acquire(package, self.downloader.as_ref())?;
        self.checkpoint(id)?;

        if let Err(e) = Decompression::extract(&archive, destination) {
            // A corrupt download must not be served from cache again.
            if !package.is_local() {
                self.cache.remove(&archive);
            }
            return Err(match e {
                SError::Acquisition(_) => e,
                other => SError::Acquisition(format!("failed to extract {}: {other}", package.title)),
            });
        }

        if !package.is_local() {
            self.cache.release(&archive);
        }
        Ok(())
    }

    /// Stores the link in the session and on disk. If the session went away meanwhile,
    /// the link is undone on the spot.
    fn record_link(&self, id: u64, record: LinkRecord) -> Result<(), SError> {
        let stored = with_session_mut(&self.session, id, |s| s.link = Some(record.clone()));
        if let Err(e) = stored {
            if let Err(unlink) = Linker::unlink_directory(self.platform.as_ref(), &record) {
                error!("Failed to undo link of an abandoned session: {unlink}");
            }
            return Err(e);
        }

        if let Err(e) = Toml::write(&self.paths().session, &record) {
            warn!("Couldn't persist session record: {e}");
        }
        Ok(())
    }

    fn spawn_automation(&self, entry: Utf8PathBuf, context: AutomationContext) {
        let this = self.clone();
        let spawned = thread::Builder::new()
            .name("spplice-automation".into())
            .spawn(move || {
                this.publish(InstallEvent::AutomationStarted);
                let result = sandbox::run_entry_point(&entry, context);
                if let Err(e) = &result {
                    error!(target: "script", source = %entry, "{e}");
                }
                this.publish(InstallEvent::AutomationFinished {
                    error: result.err().map(|e| e.to_string()),
                });
            });
        if let Err(e) = spawned {
            error!("Failed to spawn automation thread: {e}");
        }
    }

    fn supervise(&self, id: u64) {
        let names = self.options.game.process_name_refs();
        let stop = || self.checkpoint(id).is_err();
        ProcessLocator::wait_for_exit(self.platform.as_ref(), &names, self.options.poll_interval, &stop);
        info!(id, "Game closed, uninstalling");
        self.teardown(id);
    }

    /// Tears down session `id` if it is still the current one.
    fn teardown(&self, id: u64) {
        let torn_down = {
            let mut guard = self.session.lock();
            if guard.as_ref().map(|s| s.id) != Some(id) {
                false
            } else {
                guard.take().map(|s| self.cleanup(s)).is_some()
            }
        };
        if torn_down {
            self.publish(InstallEvent::StateChanged(InstallState::Idle));
        }
    }

    /// Stops automation, removes the link (never a real directory), and deletes session content.
    fn cleanup(&self, session: InstallationSession) {
        session.automation_stop.store(true, Ordering::SeqCst);
        let paths = self.paths();

        if let Some(record) = &session.link {
            if let Err(e) = Linker::unlink_directory(self.platform.as_ref(), record) {
                error!("Failed to unlink package content: {e}");
            }
        }
        if let Err(e) = fs::remove_file(&paths.session) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove session record: {e}");
            }
        }
        for dir in [&session.temp_content_directory, &paths.merge] {
            if let Err(e) = FileUtils::remove_dir_if_exists(dir) {
                error!(%dir, "Failed to remove session content: {e}");
            }
        }
        info!(id = session.id, "Session cleaned up");
    }

    /// Idempotent. While installing, asks the worker to stop at its next step.
    #[instrument(skip(self))]
    pub fn uninstall(&self) -> Result<(), SError> {
        let taken = {
            let mut guard = self.session.lock();
            let Some(session) = guard.as_mut() else {
                return Ok(());
            };
            if session.state == InstallState::Installing {
                info!(id = session.id, "Cancellation requested");
                session.cancel_requested = true;
                session.automation_stop.store(true, Ordering::SeqCst);
                return Ok(());
            }
            guard.take().map(|s| self.cleanup(s))
        };
        if taken.is_some() {
            self.publish(InstallEvent::StateChanged(InstallState::Idle));
        }
        Ok(())
    }

    /// Terminates the game, then uninstalls.
    #[instrument(skip(self))]
    pub fn kill_game(&self) -> Result<(), SError> {
        let killed = self.platform.kill_processes(&self.options.game.process_name_refs());
        info!(killed, "Killed game processes");
        self.uninstall()
    }

    /// Crash path: tears down whatever the session recorded, in any state.
    /// Gives up instead of deadlocking if the slot stays locked.
    pub fn emergency_cleanup(&self) {
        let Some(mut guard) = self.session.try_lock_for(Duration::from_secs(2)) else {
            error!("Session lock unavailable during emergency cleanup");
            return;
        };
        if let Some(session) = guard.take() {
            warn!(id = session.id, "Emergency cleanup");
            self.cleanup(session);
        }
    }

    /// Exit path shared by signals, panics and normal shutdown: if a session exists,
    /// the game goes down with it.
    pub fn shutdown(&self) {
        let active = self
            .session
            .try_lock_for(Duration::from_secs(2))
            .map_or(true, |guard| guard.is_some());
        if active {
            let killed = self.platform.kill_processes(&self.options.game.process_name_refs());
            info!(killed, "Killed game processes on shutdown");
        }
        self.emergency_cleanup();
    }

    /// Undoes a link left behind by a process that died without cleaning up.
    #[instrument(skip(self))]
    pub fn recover(&self) -> Result<Option<LinkRecord>, SError> {
        let guard = self.session.lock();
        if guard.is_some() {
            return Err(SError::Busy);
        }

        let paths = self.paths();
        if !paths.session.is_file() {
            return Ok(None);
        }

        let record: LinkRecord = Toml::read(&paths.session)?;
        warn!(destination = %record.destination, "Recovering leftover link");
        Linker::unlink_directory(self.platform.as_ref(), &record)?;
        fs::remove_file(&paths.session)?;
        FileUtils::remove_dir_if_exists(&paths.tempcontent)?;
        drop(guard);
        Ok(Some(record))
    }

    /// Empties the package cache. Refused while a session exists.
    pub fn clear_cache(&self) -> Result<(), SError> {
        if self.is_busy() {
            return Err(SError::Busy);
        }
        self.recover()?;
        self.cache.clear()
    }
}
