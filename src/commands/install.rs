use crate::core::orchestrator::Orchestrator;
use crate::models::error::SError;
use crate::models::event::InstallEvent;
use crate::models::package::PackageDescriptor;
use crate::models::session::InstallState;
use crate::utils::guard::install_crash_hooks;
use camino::Utf8Path;
use std::fs;
use tracing::{error, info, warn};

/// A `.json` argument is a package manifest; anything else is a local archive.
pub fn descriptor_from_arg(arg: &Utf8Path) -> Result<PackageDescriptor, SError> {
    if arg.extension() == Some("json") {
        let json = fs::read_to_string(arg)?;
        return Ok(PackageDescriptor::from_manifest(&json, arg.as_str())?);
    }
    if !arg.is_file() {
        return Err(SError::Acquisition(format!("{arg} does not exist")));
    }
    let absolute = dunce::canonicalize(arg)?;
    Ok(PackageDescriptor::local(&absolute.to_string_lossy()))
}

/// Installs and blocks until the game closes and everything is cleaned up.
pub fn install(orchestrator: &Orchestrator, args: &[camino::Utf8PathBuf]) -> Result<(), SError> {
    let packages = args
        .iter()
        .map(|arg| descriptor_from_arg(arg))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(record) = orchestrator.recover()? {
        warn!(destination = %record.destination, "Removed a link left over from a previous run");
    }

    let _guard = install_crash_hooks(orchestrator);
    let events = orchestrator.subscribe();
    let worker = orchestrator.install(packages)?;

    let mut failure = None;
    for event in events.iter() {
        match event {
            InstallEvent::StateChanged(InstallState::Installed) => {
                info!("Package installed, have fun! Close the game to uninstall.")
            }
            InstallEvent::StateChanged(InstallState::Idle) => break,
            InstallEvent::StateChanged(_) => {}
            InstallEvent::Failed(message) => failure = Some(message),
            InstallEvent::AutomationStarted => info!("Package script started"),
            InstallEvent::AutomationFinished { error: Some(e) } => {
                error!("Package script crashed: {e}")
            }
            InstallEvent::AutomationFinished { error: None } => info!("Package script finished"),
        }
    }

    if worker.join().is_err() {
        return Err(SError::Unexpected(Some("install worker panicked".into())));
    }
    match failure {
        Some(message) => Err(SError::Unexpected(Some(message))),
        None => Ok(()),
    }
}
