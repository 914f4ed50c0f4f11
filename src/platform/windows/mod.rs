//! Windows binding to `interception.dll` and the native installer checks.

mod dll;
mod installer;

pub use dll::{DllBinding, native_loader};
pub use installer::RegistryInstaller;

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A resource written out to the temp directory, removed on drop.
pub(crate) struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub(crate) fn write(name: &str, bytes: &[u8]) -> Result<Self> {
        let unique = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "interceptor_{}_{}_{}",
            std::process::id(),
            unique,
            name
        ));
        std::fs::write(&path, bytes)
            .map_err(|e| Error::Platform(format!("failed to write {}: {}", path.display(), e)))?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::debug!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}
