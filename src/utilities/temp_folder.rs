//! Scoped working directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What happens to a [`TemporaryFolder`] when it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryCloseMode {
    /// Leave the directory and everything in it.
    KeepAll,
    /// Empty the directory but keep it.
    DeleteContents,
    /// Remove the directory.
    #[default]
    DeleteDirectory,
}

/// A directory that exists for the lifetime of this guard.
///
/// Opening creates the directory (an existing one is reused). Dropping applies
/// the [`DirectoryCloseMode`]. Cleanup failures are logged, never raised.
#[derive(Debug)]
pub struct TemporaryFolder {
    path: PathBuf,
    close_mode: DirectoryCloseMode,
}

impl TemporaryFolder {
    pub fn open(path: impl Into<PathBuf>, close_mode: DirectoryCloseMode) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path, close_mode })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close_mode(&self) -> DirectoryCloseMode {
        self.close_mode
    }

    fn close(&self) -> io::Result<()> {
        match self.close_mode {
            DirectoryCloseMode::KeepAll => Ok(()),
            DirectoryCloseMode::DeleteDirectory => remove_if_present(&self.path),
            DirectoryCloseMode::DeleteContents => {
                remove_if_present(&self.path)?;
                fs::create_dir_all(&self.path)
            }
        }
    }
}

impl Drop for TemporaryFolder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!(
                "Failed to clean up temporary folder {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
