//! Driver installation and bundled resources.
//!
//! Installing the filter driver is done by an external installer executable;
//! this crate only decides whether to run it. [`Installer`] is the capability
//! surface the [`crate::Interceptor`] consults, and [`Resources`] supplies the
//! driver library and installer bytes by name.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Resource name of the installer executable.
pub const INSTALLER_RESOURCE: &str = "install_interception.exe";

/// Resource name of the driver library for the current pointer width.
pub fn driver_library_resource() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "interception_x64.dll"
    } else {
        "interception_x86.dll"
    }
}

/// Host capabilities needed to manage the driver installation.
pub trait Installer: Send + Sync {
    /// Whether the filter driver is registered with the system.
    fn is_driver_installed(&self) -> bool;

    /// Whether the current process runs with administrator rights.
    fn has_admin_rights(&self) -> bool;

    /// Run the installer with `args`, returning its exit code.
    fn run_installer(&self, args: &[&str]) -> Result<i32>;
}

/// Supplies opaque resource blobs by name.
pub trait Resources: Send + Sync {
    /// The bytes of resource `name`.
    fn resource(&self, name: &str) -> Result<Vec<u8>>;
}

/// Resources read from files in a directory.
#[derive(Debug, Clone)]
pub struct ResourceDir {
    root: PathBuf,
}

impl ResourceDir {
    /// Serve resources from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Resources for ResourceDir {
    fn resource(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|e| {
            Error::DriverUnavailable(format!("failed to read {}: {}", path.display(), e))
        })
    }
}

/// Resources held in memory, e.g. from `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct ResourceMap {
    entries: HashMap<String, Vec<u8>>,
}

impl ResourceMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource.
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(name.into(), bytes.into());
        self
    }
}

impl Resources for ResourceMap {
    fn resource(&self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DriverUnavailable(format!("missing resource {}", name)))
    }
}
