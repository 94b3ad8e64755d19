use crate::core::download::Downloader;
use crate::models::error::SError;
use crate::models::package::PackageDescriptor;
use crate::utils::file::FileUtils;
use crate::utils::id::cache_key;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::{debug, info, warn};

const VERSION_SUFFIX: &str = ".ver";

/// Downloaded archives and icons, keyed by a hash of their URL, each with a `.ver` marker.
#[derive(Clone, Debug)]
pub struct PackageCache {
    root: Utf8PathBuf,
    enabled: bool,
}

impl PackageCache {
    pub fn new(root: &Utf8Path, enabled: bool) -> Self {
        Self {
            root: root.to_owned(),
            enabled,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn entry_path(&self, reference: &str) -> Utf8PathBuf {
        self.root.join(cache_key(reference))
    }

    fn marker_path(entry: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{entry}{VERSION_SUFFIX}"))
    }

    /// Valid iff the entry exists and the first line of its marker equals `version`.
    pub fn is_valid(&self, entry: &Utf8Path, version: &str) -> bool {
        if !entry.is_file() {
            return false;
        }
        fs::read_to_string(Self::marker_path(entry))
            .map(|text| text.lines().next().unwrap_or_default() == version)
            .unwrap_or(false)
    }

    /// Returns a local path to the package archive, downloading it unless a valid copy is cached.
    pub fn acquire(
        &self,
        package: &PackageDescriptor,
        downloader: &dyn Downloader,
    ) -> Result<Utf8PathBuf, SError> {
        if package.is_local() {
            let path = Utf8PathBuf::from(&package.archive_reference);
            if !path.is_file() {
                return Err(SError::Acquisition(format!("{path} does not exist")));
            }
            return Ok(path);
        }

        let entry = self.entry_path(&package.archive_reference);
        if self.enabled && self.is_valid(&entry, &package.version) {
            info!(title = %package.title, "Cached package found, skipping download");
            return Ok(entry);
        }

        self.fetch(&package.archive_reference, &entry, &package.version, downloader)
            .map_err(|e| match e {
                SError::Acquisition(_) => e,
                other => SError::Acquisition(other.to_string()),
            })?;
        Ok(entry)
    }

    /// Same scheme as archives. Icons have no version of their own, so the package's is used.
    pub fn acquire_icon(
        &self,
        package: &PackageDescriptor,
        downloader: &dyn Downloader,
    ) -> Result<Utf8PathBuf, SError> {
        if package.icon_reference.is_empty() {
            return Err(SError::Acquisition(format!("{} has no icon", package.title)));
        }
        if package.is_local() {
            return Ok(Utf8PathBuf::from(&package.icon_reference));
        }

        let entry = self.entry_path(&package.icon_reference);
        if self.is_valid(&entry, &package.version) {
            return Ok(entry);
        }
        self.fetch(&package.icon_reference, &entry, &package.version, downloader)?;
        Ok(entry)
    }

    fn fetch(
        &self,
        url: &str,
        entry: &Utf8Path,
        version: &str,
        downloader: &dyn Downloader,
    ) -> Result<(), SError> {
        fs::create_dir_all(&self.root)?;
        debug!(url, %entry, "Downloading into cache");
        downloader.download_file(url, entry)?;

        if self.enabled {
            if let Err(e) = fs::write(Self::marker_path(entry), version) {
                warn!(%entry, "Couldn't write package version file: {e}");
            }
        }
        Ok(())
    }

    /// Drops an entry after use when caching is off.
    pub fn release(&self, entry: &Utf8Path) {
        if self.enabled || !entry.starts_with(&self.root) {
            return;
        }
        self.remove(entry);
    }

    /// Deletes an entry and its marker, e.g. after it failed to extract.
    pub fn remove(&self, entry: &Utf8Path) {
        if !entry.starts_with(&self.root) {
            return;
        }
        for path in [entry.to_owned(), Self::marker_path(entry)] {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(%path, "Failed to remove cache file: {e}");
                }
            }
        }
    }

    /// Empties the cache root.
    pub fn clear(&self) -> Result<(), SError> {
        info!(root = %self.root, "Clearing package cache");
        FileUtils::remove_dir_if_exists(&self.root)?;
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
