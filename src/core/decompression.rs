use crate::models::error::SError;
use camino::Utf8Path;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Component;
use tracing::{debug, warn};
use xz2::read::XzDecoder;

pub struct Decompression;

impl Decompression {
    /// Extracts a `.tar.xz` archive into `destination`, which is created if missing.
    pub fn extract(archive_path: &Utf8Path, destination: &Utf8Path) -> Result<(), SError> {
        // 1. Open the archive through the xz decoder
        let file = File::open(archive_path)
            .map_err(|e| SError::Acquisition(format!("could not open {archive_path}: {e}")))?;
        let mut archive = tar::Archive::new(XzDecoder::new(BufReader::new(file)));
        archive.set_preserve_mtime(true);
        archive.set_overwrite(true);

        fs::create_dir_all(destination)?;

        let entries = archive
            .entries()
            .map_err(|e| SError::Acquisition(format!("{archive_path} is not a tar.xz archive: {e}")))?;

        // 2. Iterate through all entries in the archive
        for entry in entries {
            let mut entry =
                entry.map_err(|e| SError::Acquisition(format!("archive read error: {e}")))?;

            let path = entry
                .path()
                .map_err(|e| SError::Acquisition(format!("bad entry path: {e}")))?
                .into_owned();

            // 3. Security: skip anything that could land outside the destination
            if !Self::is_enclosed(&path) {
                warn!(path = %path.display(), "Skipping archive entry outside destination");
                continue;
            }

            // 4. unpack_in re-roots the entry and refuses escapes through links as well
            let unpacked = entry
                .unpack_in(destination)
                .map_err(|e| SError::Acquisition(format!("archive write error: {e}")))?;
            if unpacked {
                debug!(path = %path.display(), "Extracted");
            }
        }

        Ok(())
    }

    fn is_enclosed(path: &std::path::Path) -> bool {
        path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    }
}
