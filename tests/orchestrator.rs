mod common;

use camino::{Utf8Path, Utf8PathBuf};
use common::{fake_game_install, utf8_tempdir, write_archive, FakeDownloader, FakeLauncher, FakePlatform};
use spplice_lib::core::linker::Linker;
use spplice_lib::core::netcon::DEFAULT_NETCON_PORT;
use spplice_lib::core::orchestrator::{Orchestrator, OrchestratorOptions};
use spplice_lib::models::error::SError;
use spplice_lib::models::event::InstallEvent;
use spplice_lib::models::game::GameTarget;
use spplice_lib::models::package::{PackageDescriptor, LOCAL_ORIGIN};
use spplice_lib::models::paths::CachePaths;
use spplice_lib::models::session::InstallState;
use spplice_lib::utils::toml::Toml;
use std::fs;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Harness {
    _tmp: TempDir,
    root: Utf8PathBuf,
    game_dir: Utf8PathBuf,
    platform: Arc<FakePlatform>,
    launcher: Arc<FakeLauncher>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(configure: impl FnOnce(&mut OrchestratorOptions, &mut FakeLauncher)) -> Self {
        let (tmp, root) = utf8_tempdir();
        let (game_dir, executable) = fake_game_install(&root);

        let platform = Arc::new(FakePlatform::default());
        let mut launcher = FakeLauncher::new(platform.clone(), &executable);

        let mut options = OrchestratorOptions::new(&root.join("cache"), GameTarget::by_index(0).unwrap());
        options.poll_interval = Duration::from_millis(10);
        options.process_start_timeout = Some(Duration::from_secs(5));
        configure(&mut options, &mut launcher);

        let launcher = Arc::new(launcher);
        let orchestrator = Orchestrator::new(
            options,
            platform.clone(),
            launcher.clone(),
            Arc::new(FakeDownloader::default()),
        );

        Self {
            _tmp: tmp,
            root,
            game_dir,
            platform,
            launcher,
            orchestrator,
        }
    }

    fn archive(&self, name: &str, files: &[(&str, &str)]) -> PackageDescriptor {
        let path = self.root.join(name);
        write_archive(&path, files);
        PackageDescriptor::local(path.as_str())
    }

    fn link(&self) -> Utf8PathBuf {
        self.game_dir.join("portal2_tempcontent")
    }

    fn paths(&self) -> CachePaths {
        CachePaths::new(&self.root.join("cache"))
    }

    fn wait_for(&self, state: InstallState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.orchestrator.state() != state {
            assert!(Instant::now() < deadline, "timed out waiting for {state:?}");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn assert_cleaned_up(&self) {
        assert_eq!(self.orchestrator.state(), InstallState::Idle);
        assert!(self.orchestrator.session().is_none());
        assert!(!Linker::is_directory_link(self.platform.as_ref(), &self.link()));
        assert!(!self.link().exists());
        assert!(!self.paths().tempcontent.exists());
        assert!(!self.paths().session.exists());
    }
}

fn drain(events: &Receiver<InstallEvent>) -> Vec<InstallEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.recv_timeout(Duration::from_secs(10)) {
        let done = event == InstallEvent::StateChanged(InstallState::Idle);
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

fn assert_link_points_into(link: &Utf8Path, file: &str, contents: &str) {
    assert_eq!(fs::read_to_string(link.join(file)).unwrap(), contents);
}

#[test]
fn test_install_runs_until_the_game_exits() {
    let h = Harness::new(|_, _| {});
    let events = h.orchestrator.subscribe();
    let package = h.archive("pkg.tar.xz", &[("maps/test.bsp", "map"), ("cfg/autoexec.cfg", "echo hi")]);

    let worker = h.orchestrator.install(vec![package.clone()]).unwrap();
    h.wait_for(InstallState::Installed);

    // 1. Content is live inside the game
    assert!(Linker::is_directory_link(h.platform.as_ref(), &h.link()));
    assert_link_points_into(&h.link(), "maps/test.bsp", "map");
    assert_link_points_into(&h.link(), "maps/soundcache/_master.cache", "sounds");
    assert!(h.paths().session.is_file());

    let session = h.orchestrator.session().unwrap();
    assert_eq!(session.game_directory.as_deref(), Some(h.game_dir.as_path()));
    assert_eq!(session.netcon_port, None);
    assert_eq!(session.titles, vec!["pkg".to_string()]);

    // 2. No console port without a script
    assert_eq!(h.launcher.launches.lock().as_slice(), &[(None, Vec::<String>::new())]);

    // 3. A second install is refused and changes nothing
    assert_eq!(h.orchestrator.install(vec![package]).unwrap_err(), SError::Busy);
    assert_eq!(h.orchestrator.state(), InstallState::Installed);
    assert_eq!(h.launcher.launches.lock().len(), 1);

    // 4. Closing the game uninstalls
    h.platform.exit_all();
    worker.join().unwrap();
    h.assert_cleaned_up();

    assert_eq!(
        drain(&events),
        vec![
            InstallEvent::StateChanged(InstallState::Installing),
            InstallEvent::StateChanged(InstallState::Installed),
            InstallEvent::StateChanged(InstallState::Idle),
        ]
    );
}

#[test]
fn test_javascript_automation_is_skipped() {
    let h = Harness::new(|_, _| {});
    let package = h.archive("js.tar.xz", &[("main.js", "SendToConsole('quit')"), ("a.txt", "a")]);

    let worker = h.orchestrator.install(vec![package]).unwrap();
    h.wait_for(InstallState::Installed);

    assert_eq!(h.orchestrator.session().unwrap().netcon_port, None);
    assert_eq!(h.launcher.launches.lock().as_slice(), &[(None, Vec::<String>::new())]);
    assert_link_points_into(&h.link(), "main.js", "SendToConsole('quit')");

    h.platform.exit_all();
    worker.join().unwrap();
    h.assert_cleaned_up();
}

#[test]
fn test_uninstall_is_idempotent() {
    let h = Harness::new(|_, _| {});
    h.orchestrator.uninstall().unwrap();

    let package = h.archive("pkg.tar.xz", &[("a.txt", "a")]);
    let worker = h.orchestrator.install(vec![package]).unwrap();
    h.wait_for(InstallState::Installed);

    h.orchestrator.uninstall().unwrap();
    h.assert_cleaned_up();
    h.orchestrator.uninstall().unwrap();

    // The game is still running; the worker must notice the session is gone on its own.
    worker.join().unwrap();
    assert_eq!(h.platform.running(), 1);
}

#[test]
fn test_kill_game_terminates_and_uninstalls() {
    let h = Harness::new(|_, _| {});
    let package = h.archive("pkg.tar.xz", &[("a.txt", "a")]);
    let worker = h.orchestrator.install(vec![package]).unwrap();
    h.wait_for(InstallState::Installed);

    h.orchestrator.kill_game().unwrap();
    assert_eq!(h.platform.running(), 0);
    worker.join().unwrap();
    h.assert_cleaned_up();
}

#[test]
fn test_existing_directory_at_the_destination_survives_a_session() {
    let h = Harness::new(|_, _| {});
    fs::create_dir_all(h.link()).unwrap();
    fs::write(h.link().join("mine.txt"), "mine").unwrap();

    let package = h.archive("pkg.tar.xz", &[("a.txt", "a")]);
    let worker = h.orchestrator.install(vec![package]).unwrap();
    h.wait_for(InstallState::Installed);
    assert_link_points_into(&h.link(), "a.txt", "a");

    h.platform.exit_all();
    worker.join().unwrap();
    assert_eq!(fs::read_to_string(h.link().join("mine.txt")).unwrap(), "mine");
}

#[test]
fn test_cancel_while_waiting_for_the_game() {
    let h = Harness::new(|options, launcher| {
        options.process_start_timeout = None;
        launcher.start_process = false;
    });
    let events = h.orchestrator.subscribe();
    let package = h.archive("pkg.tar.xz", &[("a.txt", "a")]);

    let worker = h.orchestrator.install(vec![package]).unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    while h.launcher.launches.lock().is_empty() {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(10));
    }

    h.orchestrator.uninstall().unwrap();
    worker.join().unwrap();
    h.assert_cleaned_up();

    assert_eq!(
        drain(&events),
        vec![
            InstallEvent::StateChanged(InstallState::Installing),
            InstallEvent::StateChanged(InstallState::Idle),
        ]
    );
}

#[test]
fn test_start_timeout_reports_failure() {
    let h = Harness::new(|options, launcher| {
        options.process_start_timeout = Some(Duration::from_millis(50));
        launcher.start_process = false;
    });
    let events = h.orchestrator.subscribe();
    let package = h.archive("pkg.tar.xz", &[("a.txt", "a")]);

    h.orchestrator.install(vec![package]).unwrap().join().unwrap();
    h.assert_cleaned_up();

    let seen = drain(&events);
    assert!(seen
        .iter()
        .any(|e| matches!(e, InstallEvent::Failed(message) if message.starts_with("Timed out"))));
}

#[test]
fn test_broken_archive_fails_before_launch() {
    let h = Harness::new(|_, _| {});
    let path = h.root.join("broken.tar.xz");
    fs::write(&path, "not an archive").unwrap();

    let worker = h.orchestrator.install(vec![PackageDescriptor::local(path.as_str())]).unwrap();
    worker.join().unwrap();

    h.assert_cleaned_up();
    assert!(h.launcher.launches.lock().is_empty());
    assert!(path.exists());
}

#[test]
fn test_merged_packages_run_their_script() {
    let h = Harness::new(|_, _| {});
    let events = h.orchestrator.subscribe();

    let first = h.root.join("first.tar.xz");
    let second = h.root.join("second.tar.xz");
    write_archive(&first, &[("main.lua", "fs.write('from_script.txt', 'hi')"), ("a.txt", "a")]);
    write_archive(&second, &[("b.txt", "b")]);

    let manifest = |file: &Utf8Path, args: &[&str]| {
        let json = serde_json::json!({ "title": file, "author": "t", "file": file, "args": args });
        PackageDescriptor::from_manifest(&json.to_string(), LOCAL_ORIGIN).unwrap()
    };
    let packages = vec![manifest(&first, &["+map", "a"]), manifest(&second, &["-novid"])];

    let worker = h.orchestrator.install(packages).unwrap();
    h.wait_for(InstallState::Installed);

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            InstallEvent::AutomationFinished { error } => {
                assert_eq!(error, None);
                break;
            }
            _ => assert!(Instant::now() < deadline),
        }
    }

    assert_link_points_into(&h.link(), "a.txt", "a");
    assert_link_points_into(&h.link(), "b.txt", "b");
    assert_link_points_into(&h.link(), "from_script.txt", "hi");
    assert!(!h.paths().merge.exists());

    let launches = h.launcher.launches.lock().clone();
    assert_eq!(
        launches,
        vec![(Some(DEFAULT_NETCON_PORT), vec!["+map".to_string(), "a".into(), "-novid".into()])]
    );

    h.platform.exit_all();
    worker.join().unwrap();
    h.assert_cleaned_up();
}

#[test]
fn test_emergency_cleanup_tears_down_any_state() {
    let h = Harness::new(|_, _| {});
    let package = h.archive("pkg.tar.xz", &[("a.txt", "a")]);
    let worker = h.orchestrator.install(vec![package]).unwrap();
    h.wait_for(InstallState::Installed);

    h.orchestrator.emergency_cleanup();
    h.assert_cleaned_up();

    h.platform.exit_all();
    worker.join().unwrap();
}

#[test]
fn test_recover_removes_a_leftover_link() {
    let h = Harness::new(|_, _| {});
    let stale_content = h.paths().tempcontent;
    fs::create_dir_all(&stale_content).unwrap();

    let record = Linker::link_directory(h.platform.as_ref(), &stale_content, &h.link()).unwrap();
    Toml::write(&h.paths().session, &record).unwrap();

    assert_eq!(h.orchestrator.recover().unwrap(), Some(record));
    h.assert_cleaned_up();
    assert_eq!(h.orchestrator.recover().unwrap(), None);
}

#[test]
fn test_clear_cache_is_refused_while_busy() {
    let h = Harness::new(|_, _| {});
    let package = h.archive("pkg.tar.xz", &[("a.txt", "a")]);
    let worker = h.orchestrator.install(vec![package]).unwrap();
    h.wait_for(InstallState::Installed);

    assert_eq!(h.orchestrator.clear_cache(), Err(SError::Busy));
    assert_eq!(h.orchestrator.recover(), Err(SError::Busy));

    h.platform.exit_all();
    worker.join().unwrap();
    h.orchestrator.clear_cache().unwrap();
    assert!(h.orchestrator.cache().root().is_dir());
}
