use crate::core::platform::PlatformOps;
use crate::models::error::SError;
use crate::models::paths::{BACKUP_DIR_NAME, BACKUP_SLOTS};
use crate::models::session::LinkRecord;
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::{info, warn};

pub struct Linker;

impl Linker {
    /// Links `source` at `destination`. A stale link there is dropped; anything else is
    /// moved into a numbered backup slot first and put back if linking fails.
    pub fn link_directory(
        platform: &dyn PlatformOps,
        source: &Utf8Path,
        destination: &Utf8Path,
    ) -> Result<LinkRecord, SError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut backup = None;
        if platform.is_dir_link(destination) {
            info!(%destination, "Removing leftover link");
            platform
                .remove_dir_link(destination)
                .map_err(|e| SError::Link(format!("failed to remove stale link: {e}")))?;
        } else if destination.exists() {
            let slot = Self::backup_existing(destination)?;
            info!(%destination, backup = %slot, "Moved existing content out of the way");
            backup = Some(slot);
        }

        if let Err(e) = platform.create_dir_link(source, destination) {
            if let Some(slot) = &backup {
                if let Err(restore) = FileUtils::move_path(slot, destination) {
                    warn!(%slot, "Failed to restore backup after link failure: {restore}");
                }
            }
            return Err(SError::Link(format!("{destination}: {e}")));
        }

        Ok(LinkRecord {
            source: source.to_owned(),
            destination: destination.to_owned(),
            backup,
        })
    }

    /// Removes the link described by `record` and restores its backup.
    /// A real directory found at the destination is left alone.
    pub fn unlink_directory(platform: &dyn PlatformOps, record: &LinkRecord) -> Result<(), SError> {
        let destination = &record.destination;

        if platform.is_dir_link(destination) {
            platform
                .remove_dir_link(destination)
                .map_err(|e| SError::Link(format!("failed to remove link {destination}: {e}")))?;
        } else if destination.exists() {
            warn!(%destination, "Destination is not a link, leaving it in place");
        }

        let Some(backup) = &record.backup else {
            return Ok(());
        };

        if !backup.exists() {
            warn!(%backup, "Backup slot vanished, nothing to restore");
            return Ok(());
        }
        if destination.exists() {
            warn!(%backup, "Destination occupied, backup kept");
            return Ok(());
        }

        FileUtils::move_path(backup, destination)?;
        if let Some(root) = backup.parent() {
            // Only succeeds once the last slot is gone.
            let _ = fs::remove_dir(root);
        }
        Ok(())
    }

    /// Hard links a file, falling back to a copy across filesystems.
    pub fn link_file(source: &Utf8Path, destination: &Utf8Path) -> Result<(), SError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        if destination.is_file() {
            fs::remove_file(destination)?;
        }

        if fs::hard_link(source, destination).is_ok() {
            return Ok(());
        }
        fs::copy(source, destination)?;
        Ok(())
    }

    pub fn is_directory_link(platform: &dyn PlatformOps, path: &Utf8Path) -> bool {
        platform.is_dir_link(path)
    }

    pub fn read_link_target(path: &Utf8Path) -> Result<Utf8PathBuf, SError> {
        #[cfg(windows)]
        {
            if let Ok(target) = junction::get_target(path) {
                return Ok(Utf8PathBuf::try_from(dunce::simplified(&target).to_path_buf())?);
            }
        }
        Ok(Utf8PathBuf::try_from(fs::read_link(path)?)?)
    }

    /// Moves `path` to `<parent>/spplice_backup/<name>_N` using the first free N.
    fn backup_existing(path: &Utf8Path) -> Result<Utf8PathBuf, SError> {
        let name = path
            .file_name()
            .ok_or_else(|| SError::Link(format!("{path} has no file name")))?;
        let root = path
            .parent()
            .map(|p| p.join(BACKUP_DIR_NAME))
            .ok_or_else(|| SError::Link(format!("{path} has no parent")))?;

        let slot = (1..=BACKUP_SLOTS)
            .map(|n| root.join(format!("{name}_{n}")))
            .find(|candidate| !candidate.exists())
            .ok_or_else(|| {
                SError::Link(format!("all {BACKUP_SLOTS} backup slots for {name} are taken"))
            })?;

        FileUtils::move_path(path, &slot)
            .map_err(|e| SError::Link(format!("failed to back up {path}: {e}")))?;
        Ok(slot)
    }
}
