// src/kitchen/fs.rs

//! Filesystem access for installed files

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Filesystem operations the kitchen performs on the installation tree
///
/// Directory creation is idempotent and writes overwrite, so repeating an
/// install over an existing tree needs no cleanup.
pub trait Filesystem: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` itself is a symbolic link
    fn is_symlink(&self, path: &Path) -> bool;

    /// Write a file, replacing any existing content
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Set Unix permission bits; a no-op where unsupported
    fn set_mode(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }

    /// Create a symbolic link at `link` pointing to `target`, replacing `link`
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;
}

/// The local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Never write through a symlink left by a previous install
        if fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(path)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    #[cfg(unix)]
    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::symlink_metadata(link).is_ok() {
            fs::remove_file(link)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(target, link)?;
        #[cfg(windows)]
        std::os::windows::fs::symlink_file(target, link)?;
        Ok(())
    }
}
