use crate::core::orchestrator::Orchestrator;
use std::panic;
use std::process;
use tracing::{error, warn};

/// Runs `Orchestrator::shutdown` when dropped, so leaving `main` by any route cleans up.
pub struct CleanupGuard {
    orchestrator: Orchestrator,
}

impl CleanupGuard {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.orchestrator.shutdown();
    }
}

/// Routes Ctrl-C, SIGTERM and panics to the same teardown as a normal exit.
pub fn install_crash_hooks(orchestrator: &Orchestrator) -> CleanupGuard {
    let on_signal = orchestrator.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupted, cleaning up");
        on_signal.shutdown();
        process::exit(130);
    }) {
        error!("Failed to install signal handler: {e}");
    }

    let on_panic = orchestrator.clone();
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        error!("Panic: {info}");
        on_panic.shutdown();
        previous(info);
    }));

    CleanupGuard::new(orchestrator.clone())
}
