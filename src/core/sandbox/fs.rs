use crate::models::error::SError;
use crate::utils::path::{confine, confine_from};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Filesystem access for automation scripts.
///
/// Writes are confined to the session's extracted content. Reads resolve relative to the
/// linked content directory inside the game but may reach anything under the game directory.
#[derive(Clone, Debug)]
pub struct SandboxFs {
    write_root: Utf8PathBuf,
    read_base: Utf8PathBuf,
    read_origin: Utf8PathBuf,
}

impl SandboxFs {
    pub fn new(write_root: &Utf8Path, read_base: &Utf8Path, read_origin: &Utf8Path) -> Self {
        Self {
            write_root: write_root.to_owned(),
            read_base: read_base.to_owned(),
            read_origin: read_origin.to_owned(),
        }
    }

    pub fn write_root(&self) -> &Utf8Path {
        &self.write_root
    }

    /// Resolves a path for a mutating op. Besides the lexical check, the deepest existing
    /// ancestor must still be inside the root once links are followed.
    pub fn resolve_write(&self, op: &str, path: &str) -> Result<Utf8PathBuf, SError> {
        let violation = || SError::SandboxViolation(format!("{op}: Path traversal detected"));

        let full = confine(&self.write_root, path).ok_or_else(violation)?;

        let root = dunce::canonicalize(&self.write_root)?;
        let mut probe = full.as_path();
        while !probe.exists() {
            probe = probe.parent().ok_or_else(violation)?;
        }
        if !dunce::canonicalize(probe)?.starts_with(&root) {
            return Err(violation());
        }
        Ok(full)
    }

    /// Resolves a path for reading. An existing target must also land inside the game
    /// directory or the content root after links are followed, since the content link
    /// itself points into the cache.
    pub fn resolve_read(&self, op: &str, path: &str) -> Result<Utf8PathBuf, SError> {
        let violation = || SError::SandboxViolation(format!("{op}: Path traversal detected"));

        let full = confine_from(&self.read_base, &self.read_origin, path).ok_or_else(violation)?;
        if !full.exists() {
            return Ok(full);
        }

        let resolved = dunce::canonicalize(&full)?;
        let inside = [&self.read_base, &self.write_root]
            .into_iter()
            .filter_map(|root| dunce::canonicalize(root).ok())
            .any(|root| resolved.starts_with(root));
        if !inside {
            return Err(violation());
        }
        Ok(full)
    }

    /// Like `resolve_write`, but the root itself is off limits.
    fn resolve_entry(&self, op: &str, path: &str) -> Result<Utf8PathBuf, SError> {
        let full = self.resolve_write(op, path)?;
        if confine(&self.write_root, ".").as_ref() == Some(&full) {
            return Err(SError::SandboxViolation(format!("{op}: Refusing to touch the content root")));
        }
        Ok(full)
    }

    pub fn mkdir(&self, path: &str) -> Result<(), SError> {
        let full = self.resolve_write("fs.mkdir", path)?;
        if full.exists() {
            return Err(SError::Script("fs.mkdir: Path already exists".into()));
        }
        fs::create_dir_all(full)?;
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> Result<(), SError> {
        let full = self.resolve_entry("fs.unlink", path)?;
        let meta = fs::symlink_metadata(&full)
            .map_err(|_| SError::Script("fs.unlink: Path does not exist".into()))?;

        if meta.is_dir() {
            fs::remove_dir_all(full)?;
        } else {
            fs::remove_file(full)?;
        }
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<String, SError> {
        let full = self.resolve_read("fs.read", path)?;
        if !full.exists() {
            return Err(SError::Script("fs.read: File does not exist".into()));
        }
        if !full.is_file() {
            return Err(SError::Script("fs.read: Path is not a file".into()));
        }
        let bytes = fs::read(full)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn write(&self, path: &str, contents: &str) -> Result<(), SError> {
        let full = self.resolve_write("fs.write", path)?;
        if full.exists() && !full.is_file() {
            return Err(SError::Script(
                "fs.write: Path already exists and is not a file".into(),
            ));
        }
        fs::write(full, contents)?;
        Ok(())
    }

    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<(), SError> {
        let old_full = self.resolve_entry("fs.rename", old_path)?;
        let new_full = self.resolve_entry("fs.rename", new_path)?;

        if !old_full.exists() {
            return Err(SError::Script("fs.rename: Path does not exist".into()));
        }
        if new_full.exists() {
            return Err(SError::Script("fs.rename: New path already occupied".into()));
        }
        fs::rename(old_full, new_full)?;
        Ok(())
    }
}
