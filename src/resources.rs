use log::warn;
use std::path::{Path, PathBuf};

/// RAII guard for a scratch file (extracted subtitle tracks); removed on drop
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Claim a path; the file itself may not exist yet
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to cleanup temporary file {:?}: {}", self.path, e);
            }
        }
    }
}

/// Remove a partially written output, logging instead of failing
pub fn remove_partial_output(path: &Path) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("Removed partial output {:?}", path),
            Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
        }
    }
}
