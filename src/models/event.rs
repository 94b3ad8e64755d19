use crate::models::session::InstallState;
use serde::Serialize;

/// Progress messages published by the orchestrator to whoever subscribed.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub enum InstallEvent {
    StateChanged(InstallState),
    Failed(String),
    AutomationStarted,
    AutomationFinished { error: Option<String> },
}
