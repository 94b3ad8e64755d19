use crate::models::error::SError;
use crate::models::session::InstallationSession;
use parking_lot::Mutex;

/// Runs `f` on the session only if it is still the one with `id` and nobody asked it to stop.
pub fn with_session_mut<F, R>(
    handle: &Mutex<Option<InstallationSession>>,
    id: u64,
    f: F,
) -> Result<R, SError>
where
    F: FnOnce(&mut InstallationSession) -> R,
{
    let mut guard = handle.lock();
    match guard.as_mut() {
        Some(session) if session.id == id && !session.cancel_requested => Ok(f(session)),
        _ => Err(SError::Cancelled),
    }
}

pub fn with_session<F, R>(handle: &Mutex<Option<InstallationSession>>, f: F) -> Option<R>
where
    F: FnOnce(&InstallationSession) -> R,
{
    let guard = handle.lock();
    guard.as_ref().map(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn stale_ids_and_cancelled_sessions_are_rejected() {
        let slot = Mutex::new(Some(InstallationSession::new(
            7,
            Utf8PathBuf::from("/tmp/tempcontent"),
            Vec::new(),
        )));

        assert_eq!(with_session_mut(&slot, 7, |s| s.id), Ok(7));
        assert_eq!(with_session_mut(&slot, 6, |s| s.id), Err(SError::Cancelled));

        slot.lock().as_mut().unwrap().cancel_requested = true;
        assert_eq!(with_session_mut(&slot, 7, |s| s.id), Err(SError::Cancelled));
        assert_eq!(with_session(&slot, |s| s.id), Some(7));
    }
}
